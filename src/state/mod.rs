pub mod company_directory;

pub use company_directory::{CompanyDirectory, DirectoryEntry, SearchHit, UriResolution};
