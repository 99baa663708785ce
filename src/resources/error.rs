use std::fmt;

use thiserror::Error;

/// The asynchronously loaded assets of the scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetKind {
    /// The sphere's diffuse map.
    Texture,
    /// The OBJ + MTL model.
    Model,
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetKind::Texture => f.write_str("texture"),
            AssetKind::Model => f.write_str("model"),
        }
    }
}

/// Why an asset could not be turned into GPU resources.
#[derive(Debug, Error)]
pub enum AssetError {
    #[error("could not fetch `{path}`")]
    Fetch {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    #[error("could not decode image `{path}`")]
    Decode {
        path: String,
        #[source]
        source: image::ImageError,
    },
    #[error("could not parse material library `{path}`")]
    Material {
        path: String,
        #[source]
        source: tobj::LoadError,
    },
    #[error("could not parse geometry `{path}`")]
    Geometry {
        path: String,
        #[source]
        source: tobj::LoadError,
    },
    #[error("`{path}` contains no meshes")]
    Empty { path: String },
}

impl AssetError {
    pub fn fetch(path: &str, source: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        AssetError::Fetch {
            path: path.to_string(),
            source: source.into(),
        }
    }

    /// Path of the file that failed.
    pub fn path(&self) -> &str {
        match self {
            AssetError::Fetch { path, .. }
            | AssetError::Decode { path, .. }
            | AssetError::Material { path, .. }
            | AssetError::Geometry { path, .. }
            | AssetError::Empty { path } => path,
        }
    }

    /// The error and all of its causes on one line, for logs and load reports.
    pub fn report(&self) -> String {
        let mut report = self.to_string();
        let mut source = std::error::Error::source(self);
        while let Some(cause) = source {
            report.push_str(": ");
            report.push_str(&cause.to_string());
            source = cause.source();
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_includes_the_cause() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
        let err = AssetError::fetch("models/lobster/lobster.mtl", io);
        assert_eq!(err.path(), "models/lobster/lobster.mtl");
        assert_eq!(
            err.report(),
            "could not fetch `models/lobster/lobster.mtl`: no such file"
        );
    }

    #[test]
    fn empty_model_names_the_file() {
        let err = AssetError::Empty {
            path: "a.obj".to_string(),
        };
        assert_eq!(err.report(), "`a.obj` contains no meshes");
        assert_eq!(AssetKind::Model.to_string(), "model");
    }
}
