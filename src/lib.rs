pub mod crc;
pub mod header;
pub mod assemble;
pub mod probe;
pub mod recovery;
pub mod repair;

pub use crc::{checksum, Crc};
pub use header::{FileHeader, HeaderError};
pub use assemble::{assemble, AssembleError, CandidateFile, CorruptedFile};
pub use probe::{FitRecordProbe, ParseError, ValidationProbe};
pub use recovery::{search, Outcome, RecoveryReport, RecoverySearch};
pub use repair::{repair_file, RepairError, RepairOptions};
