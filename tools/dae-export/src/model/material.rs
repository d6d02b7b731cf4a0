//! Material resolution: material → effect → colours and diffuse texture

use crate::collada::{
    fragment, image_file_name, ColladaError, ColorOrTexture, Document, Effect, NewParamValue,
};

const BLACK: [f32; 4] = [0.0, 0.0, 0.0, 1.0];
const WHITE: [f32; 4] = [1.0, 1.0, 1.0, 1.0];

/// Flattened material written with each mesh.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputMaterial {
    pub emissive: [f32; 4],
    pub ambient: [f32; 4],
    pub diffuse: [f32; 4],
    pub specular: [f32; 4],
    pub shininess: f32,
    /// File name of the diffuse texture image
    pub texture: Option<String>,
}

impl Default for OutputMaterial {
    fn default() -> Self {
        Self {
            emissive: BLACK,
            ambient: BLACK,
            diffuse: WHITE,
            specular: BLACK,
            shininess: 0.0,
            texture: None,
        }
    }
}

impl OutputMaterial {
    /// Material and effect referenced by a material URL.
    pub fn resolve(doc: &Document, material_url: &str) -> Result<Self, ColladaError> {
        let material = doc.material(material_url)?;
        let effect = doc.effect(&material.effect)?;

        let mut out = Self::default();
        let Some(shading) = &effect.shading else {
            return Ok(out);
        };

        let color = |slot: &Option<ColorOrTexture>, default| match slot {
            Some(ColorOrTexture::Color(c)) => *c,
            _ => default,
        };
        out.emissive = color(&shading.emission, BLACK);
        out.ambient = color(&shading.ambient, BLACK);
        out.diffuse = color(&shading.diffuse, WHITE);
        out.specular = color(&shading.specular, BLACK);
        out.shininess = shading.shininess.unwrap_or(0.0);

        if let Some(ColorOrTexture::Texture { texture, .. }) = &shading.diffuse {
            out.texture = Some(texture_file(doc, effect, texture)?.to_string());
        }
        Ok(out)
    }
}

/// Follow a texture reference through sampler and surface params to an image.
fn texture_file<'d>(doc: &'d Document, effect: &Effect, texture: &str) -> Result<&'d str, ColladaError> {
    let unresolved = || ColladaError::UnresolvedReference {
        kind: "texture",
        id: texture.to_string(),
    };

    let mut reference = texture;
    // sampler2D → surface → image id, at most two hops
    for _ in 0..2 {
        match effect.param(reference).and_then(|p| p.value.as_ref()) {
            Some(NewParamValue::Sampler2D { source }) => reference = source,
            Some(NewParamValue::Surface { init_from }) => reference = init_from,
            None => break,
        }
    }

    let image = doc
        .images
        .get(fragment(reference))
        .ok_or_else(unresolved)?;
    Ok(image_file_name(&image.init_from))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collada::{Image, Material, NewParam, Shading, ShadingModel};

    fn document(diffuse: ColorOrTexture, params: Vec<NewParam>) -> Document {
        let mut doc = Document::default();
        doc.images.insert(
            "img".into(),
            Image {
                id: "img".into(),
                name: None,
                init_from: "file:///C:/textures/crate.png".into(),
            },
        );
        let mut shading = Shading::new(ShadingModel::Lambert);
        shading.diffuse = Some(diffuse);
        shading.shininess = Some(8.0);
        doc.effects.insert(
            "fx".into(),
            Effect {
                id: "fx".into(),
                name: None,
                params,
                shading: Some(shading),
            },
        );
        doc.materials.insert(
            "mat".into(),
            Material {
                id: "mat".into(),
                name: None,
                effect: "#fx".into(),
            },
        );
        doc
    }

    fn texture(name: &str) -> ColorOrTexture {
        ColorOrTexture::Texture {
            texture: name.into(),
            texcoord: None,
        }
    }

    #[test]
    fn test_defaults_for_missing_slots() {
        let doc = document(ColorOrTexture::Color([0.5, 0.5, 0.5, 1.0]), vec![]);
        let material = OutputMaterial::resolve(&doc, "#mat").unwrap();
        assert_eq!(material.diffuse, [0.5, 0.5, 0.5, 1.0]);
        assert_eq!(material.emissive, BLACK);
        assert_eq!(material.specular, BLACK);
        assert_eq!(material.shininess, 8.0);
        assert_eq!(material.texture, None);
    }

    #[test]
    fn test_texture_through_sampler_and_surface() {
        let params = vec![
            NewParam {
                sid: "surf".into(),
                value: Some(NewParamValue::Surface {
                    init_from: "img".into(),
                }),
            },
            NewParam {
                sid: "samp".into(),
                value: Some(NewParamValue::Sampler2D {
                    source: "surf".into(),
                }),
            },
        ];
        let doc = document(texture("samp"), params);
        let material = OutputMaterial::resolve(&doc, "#mat").unwrap();
        assert_eq!(material.texture.as_deref(), Some("crate.png"));
        assert_eq!(material.diffuse, WHITE);
    }

    #[test]
    fn test_texture_naming_image_directly() {
        let doc = document(texture("img"), vec![]);
        let material = OutputMaterial::resolve(&doc, "mat").unwrap();
        assert_eq!(material.texture.as_deref(), Some("crate.png"));
    }

    #[test]
    fn test_unresolved_texture_is_fatal() {
        let doc = document(texture("nothing"), vec![]);
        let err = OutputMaterial::resolve(&doc, "#mat").unwrap_err();
        assert!(matches!(err, ColladaError::UnresolvedReference { kind: "texture", .. }));
    }

    #[test]
    fn test_unresolved_material_is_fatal() {
        let doc = document(texture("img"), vec![]);
        let err = OutputMaterial::resolve(&doc, "#other").unwrap_err();
        assert!(matches!(err, ColladaError::UnresolvedReference { kind: "material", .. }));
    }
}
