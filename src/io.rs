use image::ImageError;
use image::codecs::jpeg::JpegEncoder;
use rfd::FileDialog;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use crate::actions::{Action, RawAction};
use crate::error::IoError;
use crate::ops::Mat;

/// Extensions offered by the open dialog and accepted by the CLI.
pub const IMAGE_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "bmp", "webp", "tga", "tif", "tiff", "ico",
];

const JPEG_QUALITY: u8 = 95;

pub fn is_image_extension(ext: &str) -> bool {
    IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str())
}

// ============================================================================
// IMAGES
// ============================================================================

/// Decode any supported file into a 3-channel image. Alpha is dropped.
pub fn load_image(path: &Path) -> Result<Mat, IoError> {
    let img = image::open(path).map_err(|source| IoError::Decode {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(img.to_rgb8())
}

/// Encode by the path's extension; unknown extensions fall back to PNG.
pub fn save_image(image: &Mat, path: &Path) -> Result<(), IoError> {
    encode_and_write(image, path).map_err(|source| IoError::Encode {
        path: path.to_path_buf(),
        source,
    })
}

fn encode_and_write(image: &Mat, path: &Path) -> Result<(), ImageError> {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => {
            let file = File::create(path)?;
            let mut writer = BufWriter::new(file);
            let mut encoder = JpegEncoder::new_with_quality(&mut writer, JPEG_QUALITY);
            encoder.encode(
                image.as_raw(),
                image.width(),
                image.height(),
                image::ColorType::Rgb8,
            )?;
            Ok(())
        }
        e if is_image_extension(e) => image.save(path),
        _ => image.save_with_format(path, image::ImageFormat::Png),
    }
}

// ============================================================================
// RECIPES - JSON array of raw actions
// ============================================================================

pub fn load_recipe(path: &Path) -> Result<Vec<RawAction>, IoError> {
    let reader = BufReader::new(File::open(path)?);
    serde_json::from_reader(reader).map_err(|source| IoError::Recipe {
        path: path.to_path_buf(),
        source,
    })
}

/// Load a recipe and convert every step, failing on the first bad one.
pub fn load_recipe_actions(path: &Path) -> Result<Vec<Action>, IoError> {
    let raw = load_recipe(path)?;
    let actions = raw
        .iter()
        .map(Action::try_from)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(actions)
}

pub fn save_recipe(recipe: &[RawAction], path: &Path) -> Result<(), IoError> {
    let writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(writer, recipe).map_err(|source| IoError::Recipe {
        path: path.to_path_buf(),
        source,
    })
}

// ============================================================================
// NATIVE FILE DIALOGS
// ============================================================================

fn dialog_in(start_dir: Option<&Path>) -> FileDialog {
    let dialog = FileDialog::new();
    match start_dir {
        Some(dir) if dir.is_dir() => dialog.set_directory(dir),
        _ => dialog,
    }
}

pub fn pick_image_to_open(start_dir: Option<&Path>) -> Option<PathBuf> {
    dialog_in(start_dir)
        .add_filter("Images", IMAGE_EXTENSIONS)
        .add_filter("All files", &["*"])
        .pick_file()
}

pub fn pick_image_save_path(start_dir: Option<&Path>, file_name: &str) -> Option<PathBuf> {
    dialog_in(start_dir)
        .set_file_name(file_name)
        .add_filter("PNG", &["png"])
        .add_filter("JPEG", &["jpg", "jpeg"])
        .add_filter("BMP", &["bmp"])
        .add_filter("WebP", &["webp"])
        .save_file()
}

pub fn pick_recipe_save_path(start_dir: Option<&Path>) -> Option<PathBuf> {
    dialog_in(start_dir)
        .set_file_name("recipe.json")
        .add_filter("Recipe", &["json"])
        .save_file()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::{MorphParams, MorphShape};
    use image::Rgb;

    #[test]
    fn png_round_trip_is_lossless() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("img.png");
        let img = Mat::from_fn(7, 5, |x, y| Rgb([x as u8 * 30, y as u8 * 40, 200]));
        save_image(&img, &path).unwrap();
        assert_eq!(load_image(&path).unwrap(), img);
    }

    #[test]
    fn unknown_extension_is_written_as_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("img.out");
        save_image(&Mat::new(3, 3), &path).unwrap();
        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[1..4], b"PNG");
    }

    #[test]
    fn missing_image_is_a_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_image(&dir.path().join("nope.png")).unwrap_err();
        assert!(matches!(err, IoError::Decode { .. }));
    }

    #[test]
    fn recipe_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("recipe.json");
        let action = Action::MorphOpening(MorphParams::new(MorphShape::Cross, 2));
        save_recipe(&[action.to_raw()], &path).unwrap();
        assert_eq!(load_recipe_actions(&path).unwrap(), vec![action]);
    }

    #[test]
    fn malformed_recipe_reports_json_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(load_recipe(&path), Err(IoError::Recipe { .. })));
    }

    #[test]
    fn recipe_with_unknown_action_fails_conversion() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("r.json");
        std::fs::write(&path, r#"[{"action_type": "sharpen", "params": {}}]"#).unwrap();
        assert!(matches!(load_recipe_actions(&path), Err(IoError::Action(_))));
    }
}
