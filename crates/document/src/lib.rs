//! Reading and writing JSON and YAML documents as ordered [`serde_json::Value`]s.

pub mod error;
pub mod reader;
pub mod types;
pub mod writer;

pub use error::Error;
pub use reader::{ load, parse };
pub use types::{ Format, Loaded };
pub use writer::{ render, save };

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_path() {
        assert_eq!(Format::from_path("config.yaml"), Format::Yaml);
        assert_eq!(Format::from_path("dir/config.yml"), Format::Yaml);
        assert_eq!(Format::from_path("config.json"), Format::Json);
        assert_eq!(Format::from_path("config"), Format::Json);
        assert_eq!(Format::from_path("config.YAML.bak"), Format::Json);
    }
}
