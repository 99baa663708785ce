//! Loading of meshes, textures and materials from external files, plus the
//! procedural primitives the scene is built from.
//!
//! All file access goes through [`Assets`], which resolves names against an
//! asset root: a directory on native targets and `<origin>/<root>/` on the web.

use std::io::{BufReader, Cursor};

use crate::{
    data_structures::model,
    resources::{error::AssetError, texture::diffuse_normal_layout},
};

pub mod error;
pub mod geometry;
pub mod mesh;
pub mod texture;

pub const DEFAULT_ASSET_ROOT: &str = "assets";

/// Where assets are fetched from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assets {
    root: String,
}

impl Default for Assets {
    fn default() -> Self {
        Self::new(DEFAULT_ASSET_ROOT)
    }
}

impl Assets {
    pub fn new(root: impl Into<String>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    #[cfg(not(target_arch = "wasm32"))]
    pub fn locate(&self, file_name: &str) -> std::path::PathBuf {
        std::path::Path::new(&self.root).join(file_name)
    }

    #[cfg(target_arch = "wasm32")]
    pub fn locate(&self, file_name: &str) -> Result<reqwest::Url, AssetError> {
        let origin = wgpu::web_sys::window()
            .ok_or_else(|| AssetError::fetch(file_name, "no browser window"))?
            .location()
            .origin()
            .map_err(|e| AssetError::fetch(file_name, format!("no page origin: {e:?}")))?;
        let root = self.root.trim_matches('/');
        let base = if root.is_empty() {
            format!("{origin}/")
        } else {
            format!("{origin}/{root}/")
        };
        reqwest::Url::parse(&base)
            .and_then(|base| base.join(file_name))
            .map_err(|e| AssetError::fetch(file_name, e))
    }

    pub async fn load_string(&self, file_name: &str) -> Result<String, AssetError> {
        #[cfg(target_arch = "wasm32")]
        let txt = {
            let url = self.locate(file_name)?;
            reqwest::get(url)
                .await
                .and_then(|response| response.error_for_status())
                .map_err(|e| AssetError::fetch(file_name, e))?
                .text()
                .await
                .map_err(|e| AssetError::fetch(file_name, e))?
        };
        #[cfg(not(target_arch = "wasm32"))]
        let txt = tokio::fs::read_to_string(self.locate(file_name))
            .await
            .map_err(|e| AssetError::fetch(file_name, e))?;

        Ok(txt)
    }

    pub async fn load_binary(&self, file_name: &str) -> Result<Vec<u8>, AssetError> {
        #[cfg(target_arch = "wasm32")]
        let data = {
            let url = self.locate(file_name)?;
            reqwest::get(url)
                .await
                .and_then(|response| response.error_for_status())
                .map_err(|e| AssetError::fetch(file_name, e))?
                .bytes()
                .await
                .map_err(|e| AssetError::fetch(file_name, e))?
                .to_vec()
        };
        #[cfg(not(target_arch = "wasm32"))]
        let data = tokio::fs::read(self.locate(file_name))
            .await
            .map_err(|e| AssetError::fetch(file_name, e))?;

        Ok(data)
    }

    /// Loads a material library first and then the geometry that uses it.
    ///
    /// The `mtllib` statements of the OBJ are answered with the already parsed
    /// library, so both files have to be reachable but the OBJ's reference is
    /// never fetched a second time.
    pub async fn load_model_obj(
        &self,
        mtl_path: &str,
        obj_path: &str,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
    ) -> Result<model::Model, AssetError> {
        let mtl_text = self.load_string(mtl_path).await?;
        let library = tobj::load_mtl_buf(&mut BufReader::new(Cursor::new(mtl_text))).map_err(
            |source| AssetError::Material {
                path: mtl_path.to_string(),
                source,
            },
        )?;
        log::info!("Parsed {} materials from {mtl_path}", library.0.len());

        let obj_text = self.load_string(obj_path).await?;
        let (models, _) = tobj::load_obj_buf(
            &mut BufReader::new(Cursor::new(obj_text)),
            &tobj::LoadOptions {
                triangulate: true,
                single_index: true,
                ..Default::default()
            },
            |_| Ok(library.clone()),
        )
        .map_err(|source| AssetError::Geometry {
            path: obj_path.to_string(),
            source,
        })?;

        let meshes = mesh::load_meshes(&models);
        if meshes.is_empty() {
            return Err(AssetError::Empty {
                path: obj_path.to_string(),
            });
        }

        let layout = diffuse_normal_layout(device);
        let mut materials = Vec::with_capacity(library.0.len().max(1));
        for material in &library.0 {
            materials.push(
                self.load_material(mtl_path, material, device, queue, &layout)
                    .await,
            );
        }
        if materials.is_empty() {
            log::warn!("{mtl_path} defines no materials, {obj_path} is drawn in white");
            materials.push(model::Material::from_color(
                device, queue, "default", 0xffffff, &layout,
            ));
        }

        let meshes = meshes
            .iter()
            .map(|(name, data, material)| mesh::upload_mesh(device, name, data, *material))
            .collect();

        Ok(model::Model { meshes, materials })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(name: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("lobster-scene-{name}-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[tokio::test]
    async fn reads_files_below_the_root() {
        let dir = scratch_dir("read");
        std::fs::create_dir_all(dir.join("models")).unwrap();
        std::fs::write(dir.join("models/a.mtl"), "newmtl shell\nKd 1 0 0\n").unwrap();

        let assets = Assets::new(dir.to_string_lossy());
        let text = assets.load_string("models/a.mtl").await.unwrap();
        assert!(text.starts_with("newmtl shell"));
        assert_eq!(assets.load_binary("models/a.mtl").await.unwrap(), text.into_bytes());
    }

    #[tokio::test]
    async fn missing_files_are_fetch_errors() {
        let assets = Assets::new(scratch_dir("missing").to_string_lossy());
        let err = assets.load_binary("images/disco2.jpg").await.unwrap_err();
        assert!(matches!(err, AssetError::Fetch { .. }));
        assert_eq!(err.path(), "images/disco2.jpg");
    }

    #[test]
    fn default_root_is_assets() {
        assert_eq!(Assets::default().root(), "assets");
        assert_eq!(
            Assets::default().locate("models/lobster/lobster.obj"),
            std::path::Path::new("assets/models/lobster/lobster.obj")
        );
    }
}
