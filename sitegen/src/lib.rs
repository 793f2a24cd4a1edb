pub mod assets;
pub mod body;
pub mod error;
pub mod markdown;
pub mod pages;
pub mod rows;
pub mod segment;
pub mod settings;
pub mod site;
pub mod sqlite_source;
pub mod stubs;
pub mod textio;
pub mod tree_assembly;
pub mod tree_text;

pub use error::SiteError;
pub use settings::{Overrides, Settings};
pub use site::{BuildReport, build_site, load_forest};
