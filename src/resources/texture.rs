use crate::{
    data_structures::{model, texture::Texture},
    resources::{Assets, error::AssetError},
};

pub fn diffuse_normal_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    multisampled: false,
                    view_dimension: wgpu::TextureViewDimension::D2,
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 2,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    multisampled: false,
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    view_dimension: wgpu::TextureViewDimension::D2,
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 3,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            },
        ],
        label: Some("Model texture_bind_group_layout"),
    })
}

/// Resolves a texture reference found in a material library against the
/// library's own directory. Backslashes, `.` and `..` segments are normalised.
pub fn resolve_relative(base_file: &str, reference: &str) -> String {
    let reference = reference.trim().replace('\\', "/");
    if let Some(absolute) = reference.strip_prefix('/') {
        return normalise(absolute.split('/'));
    }
    let dir = base_file.rsplit_once('/').map_or("", |(dir, _)| dir);
    normalise(dir.split('/').chain(reference.split('/')))
}

fn normalise<'a>(segments: impl Iterator<Item = &'a str>) -> String {
    let mut out: Vec<&str> = Vec::new();
    for segment in segments {
        match segment {
            "" | "." => {}
            ".." => {
                out.pop();
            }
            s => out.push(s),
        }
    }
    out.join("/")
}

/// The material's `Kd` as opaque sRGB bytes, white when absent.
pub fn kd_to_rgba(diffuse: Option<[f32; 3]>) -> [u8; 4] {
    let [r, g, b] = diffuse.unwrap_or([1.0; 3]);
    let byte = |c: f32| (c.clamp(0.0, 1.0) * 255.0).round() as u8;
    [byte(r), byte(g), byte(b), 255]
}

impl Assets {
    pub async fn load_texture(
        &self,
        file_name: &str,
        is_normal_map: bool,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
    ) -> Result<Texture, AssetError> {
        let data = self.load_binary(file_name).await?;
        let extension = file_name.rsplit_once('.').map(|(_, ext)| ext);
        Texture::from_bytes(device, queue, &data, file_name, extension, is_normal_map).map_err(
            |source| AssetError::Decode {
                path: file_name.to_string(),
                source,
            },
        )
    }

    /// Turns an MTL entry into a GPU material.
    ///
    /// Texture paths are relative to `mtl_path`. A missing or broken diffuse map
    /// degrades to the `Kd` colour, a missing normal map to a flat one.
    pub async fn load_material(
        &self,
        mtl_path: &str,
        material: &tobj::Material,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        layout: &wgpu::BindGroupLayout,
    ) -> model::Material {
        let colour = kd_to_rgba(material.diffuse);
        let diffuse_texture = match &material.diffuse_texture {
            Some(reference) => {
                let path = resolve_relative(mtl_path, reference);
                match self.load_texture(&path, false, device, queue).await {
                    Ok(texture) => texture,
                    Err(e) => {
                        log::warn!(
                            "Material `{}`: {}, using its diffuse colour instead",
                            material.name,
                            e.report()
                        );
                        Texture::create_solid_color(colour, device, queue)
                    }
                }
            }
            None => Texture::create_solid_color(colour, device, queue),
        };

        let normal_texture = match &material.normal_texture {
            Some(reference) => {
                let path = resolve_relative(mtl_path, reference);
                match self.load_texture(&path, true, device, queue).await {
                    Ok(texture) => texture,
                    Err(e) => {
                        log::warn!("Material `{}`: {}", material.name, e.report());
                        Texture::create_default_normal_map(1, 1, device, queue)
                    }
                }
            }
            // We rather use a default normal map when none is passed instead of changing the pipeline
            None => Texture::create_default_normal_map(1, 1, device, queue),
        };

        model::Material::new(device, &material.name, diffuse_texture, normal_texture, layout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn textures_resolve_next_to_the_material_library() {
        assert_eq!(
            resolve_relative("models/lobster/lobster.mtl", "lobster.jpg"),
            "models/lobster/lobster.jpg"
        );
        assert_eq!(
            resolve_relative("models/lobster/lobster.mtl", "./tex\\shell.png"),
            "models/lobster/tex/shell.png"
        );
        assert_eq!(
            resolve_relative("models/lobster/lobster.mtl", "../shared/eye.png"),
            "models/shared/eye.png"
        );
    }

    #[test]
    fn rooted_and_bare_references() {
        assert_eq!(resolve_relative("lobster.mtl", "shell.png"), "shell.png");
        assert_eq!(
            resolve_relative("models/lobster/lobster.mtl", "/images/disco2.jpg"),
            "images/disco2.jpg"
        );
    }

    #[test]
    fn diffuse_colour_defaults_to_white() {
        assert_eq!(kd_to_rgba(None), [255, 255, 255, 255]);
        assert_eq!(kd_to_rgba(Some([0.0, 0.5, 2.0])), [0, 128, 255, 255]);
    }
}
