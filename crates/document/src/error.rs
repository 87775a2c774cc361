use derive_more::{ Display, Error, From };

#[derive(Error, Debug, Display, From)]
pub enum Error {
    Io(std::io::Error),
    Json(serde_json::Error),
    Yaml(serde_yaml::Error),
    Utf8(std::string::FromUtf8Error),
}
