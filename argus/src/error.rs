use derive_more::{Display, From};
use tokio::task::JoinError;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug, Display, From)]
#[display("{self:?}")]
pub enum Error {
	#[from(String, &String, &str)]
	Custom(String),

	InvalidEventSize,
	#[display("Ring buffer map 'events' not found in artifact")]
	RingMapNotFound,
	SourceClosed,

	// -- Externals
	#[from]
	Io(std::io::Error),
	#[from]
	AyaEbpf(aya::EbpfError),
	#[from]
	AyaProgram(aya::programs::ProgramError),
	#[from]
	AyaMaps(aya::maps::MapError),
	#[from]
	JoinError(JoinError),
	#[from]
	Transport(tonic::transport::Error),
}

// region:    --- Custom

impl Error {
	pub fn custom(val: impl Into<String>) -> Self {
		Self::Custom(val.into())
	}
}

// endregion: --- Custom

// region:    --- Error Boilerplate

impl std::error::Error for Error {}

// endregion: --- Error Boilerplate
