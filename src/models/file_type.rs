//! The single file-type table. The save path and the download path both go through
//! here, so a row written under a tag is always served back with the same name and
//! MIME type.

use std::path::Path;

use crate::error::ProcessingError;

pub const INPUT_IMAGE: &str = "input_image";
pub const INPUT_MODEL: &str = "input_model";

/// Extensions accepted by model uploads.
pub const MODEL_EXTENSIONS: &[&str] = &["obj", "fbx", "glb", "gltf", "ply", "stl"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileTypeEntry {
    pub tag: &'static str,
    pub file_name: &'static str,
    pub mime_type: &'static str,
}

/// Output artifacts with a canonical stored name.
pub const OUTPUT_FILE_TYPES: &[FileTypeEntry] = &[
    FileTypeEntry { tag: "glb", file_name: "output.glb", mime_type: "model/gltf-binary" },
    FileTypeEntry { tag: "preview_video", file_name: "preview.mp4", mime_type: "video/mp4" },
    FileTypeEntry { tag: "obj", file_name: "skeleton.obj", mime_type: "model/obj" },
    FileTypeEntry { tag: "json", file_name: "skeleton.json", mime_type: "application/json" },
    FileTypeEntry { tag: "txt", file_name: "skeleton.txt", mime_type: "text/plain" },
    FileTypeEntry { tag: "zip", file_name: "skeleton.zip", mime_type: "application/zip" },
];

const FALLBACK_MIME: &str = "application/octet-stream";

pub fn is_input_type(tag: &str) -> bool {
    tag == INPUT_IMAGE || tag == INPUT_MODEL
}

pub fn output_entry(tag: &str) -> Option<&'static FileTypeEntry> {
    OUTPUT_FILE_TYPES.iter().find(|entry| entry.tag == tag)
}

/// Tags become part of stored file names, so only `[a-z0-9_]` is allowed.
pub fn is_valid_tag(tag: &str) -> bool {
    !tag.is_empty()
        && tag.len() <= 32
        && tag
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_')
}

pub fn extension_of(name: &str) -> Option<String> {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
}

pub fn image_mime_from_ext(ext: &str) -> &'static str {
    match ext.to_ascii_lowercase().as_str() {
        "png" => "image/png",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "webp" => "image/webp",
        _ => "image/jpeg",
    }
}

pub fn model_mime_from_ext(ext: &str) -> &'static str {
    match ext.to_ascii_lowercase().as_str() {
        "gltf" => "model/gltf+json",
        "obj" => "model/obj",
        "stl" => "model/stl",
        "ply" => "model/ply",
        "fbx" => "model/fbx",
        _ => "model/gltf-binary",
    }
}

pub fn is_model_extension(ext: &str) -> bool {
    let ext = ext.trim_start_matches('.').to_ascii_lowercase();
    MODEL_EXTENSIONS.contains(&ext.as_str())
}

/// MIME type for an arbitrary stored file, judged by extension alone.
pub fn mime_from_file_name(name: &str) -> &'static str {
    let Some(ext) = extension_of(name) else {
        return FALLBACK_MIME;
    };
    if is_model_extension(&ext) {
        return model_mime_from_ext(&ext);
    }
    match ext.as_str() {
        "jpg" | "jpeg" | "png" | "gif" | "bmp" | "webp" => image_mime_from_ext(&ext),
        "json" => "application/json",
        "txt" => "text/plain",
        "zip" => "application/zip",
        "mp4" => "video/mp4",
        _ => FALLBACK_MIME,
    }
}

/// Strips any directory component a client may have smuggled into a file name.
fn base_name(name: &str) -> Option<&str> {
    Path::new(name)
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|n| !n.is_empty() && *n != "." && *n != "..")
}

/// Resolves the stored file name for a tag.
///
/// Inputs keep the client's name behind an `input_` prefix. Known outputs use their
/// canonical name. Anything else is stored as `<tag>.<ext>` where the extension is
/// taken from `original_name`, or `bin` when there is none.
pub fn stored_file_name(tag: &str, original_name: Option<&str>) -> Result<String, ProcessingError> {
    if !is_valid_tag(tag) {
        return Err(ProcessingError::InvalidFileType(tag.to_string()));
    }

    if is_input_type(tag) {
        let name = match original_name.and_then(base_name) {
            Some(name) => format!("input_{name}"),
            None if tag == INPUT_IMAGE => "input.jpg".to_string(),
            None => "input.glb".to_string(),
        };
        return Ok(name);
    }

    if let Some(entry) = output_entry(tag) {
        return Ok(entry.file_name.to_string());
    }

    let ext = original_name
        .and_then(extension_of)
        .filter(|ext| ext.bytes().all(|b| b.is_ascii_alphanumeric()))
        .unwrap_or_else(|| "bin".to_string());
    Ok(format!("{tag}.{ext}"))
}

/// MIME type served for a stored row. Inputs are judged by the stored name's extension.
pub fn mime_type_for(tag: &str, stored_name: &str) -> &'static str {
    let ext = extension_of(stored_name).unwrap_or_default();
    match tag {
        INPUT_IMAGE => image_mime_from_ext(&ext),
        INPUT_MODEL => model_mime_from_ext(&ext),
        _ => output_entry(tag).map(|e| e.mime_type).unwrap_or(FALLBACK_MIME),
    }
}

/// Name and MIME type for a file about to be persisted.
pub fn describe(tag: &str, original_name: Option<&str>) -> Result<(String, &'static str), ProcessingError> {
    let name = stored_file_name(tag, original_name)?;
    let mime = mime_type_for(tag, &name);
    Ok((name, mime))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_output_names() {
        assert_eq!(stored_file_name("glb", None).unwrap(), "output.glb");
        assert_eq!(stored_file_name("obj", None).unwrap(), "skeleton.obj");
        assert_eq!(stored_file_name("preview_video", None).unwrap(), "preview.mp4");
        assert_eq!(stored_file_name("zip", Some("whatever.tar")).unwrap(), "skeleton.zip");
    }

    #[test]
    fn input_names_keep_original_base_name() {
        assert_eq!(stored_file_name(INPUT_IMAGE, Some("cat.png")).unwrap(), "input_cat.png");
        assert_eq!(
            stored_file_name(INPUT_MODEL, Some("../../etc/robot.fbx")).unwrap(),
            "input_robot.fbx"
        );
        assert_eq!(stored_file_name(INPUT_IMAGE, None).unwrap(), "input.jpg");
        assert_eq!(stored_file_name(INPUT_MODEL, Some("")).unwrap(), "input.glb");
    }

    #[test]
    fn unknown_tags_fall_back_to_bin() {
        let (name, mime) = describe("rig_preview", None).unwrap();
        assert_eq!(name, "rig_preview.bin");
        assert_eq!(mime, "application/octet-stream");
    }

    #[test]
    fn rejects_tags_that_could_escape_the_directory() {
        assert!(matches!(
            stored_file_name("../glb", None),
            Err(ProcessingError::InvalidFileType(_))
        ));
        assert!(stored_file_name("GLB", None).is_err());
        assert!(stored_file_name("", None).is_err());
    }

    #[test]
    fn write_and_read_sides_agree() {
        for entry in OUTPUT_FILE_TYPES {
            let (name, write_mime) = describe(entry.tag, None).unwrap();
            assert_eq!(mime_type_for(entry.tag, &name), write_mime, "{}", entry.tag);
        }
        for (tag, original) in [(INPUT_IMAGE, "a.webp"), (INPUT_MODEL, "b.obj"), (INPUT_MODEL, "c.gltf")] {
            let (name, write_mime) = describe(tag, Some(original)).unwrap();
            assert_eq!(mime_type_for(tag, &name), write_mime);
        }
    }

    #[test]
    fn obj_is_model_obj_everywhere() {
        assert_eq!(mime_type_for("obj", "skeleton.obj"), "model/obj");
        assert_eq!(mime_type_for(INPUT_MODEL, "input_x.obj"), "model/obj");
        assert_eq!(mime_from_file_name("output.obj"), "model/obj");
    }

    #[test]
    fn extension_tables() {
        assert_eq!(image_mime_from_ext("PNG"), "image/png");
        assert_eq!(image_mime_from_ext("tiff"), "image/jpeg");
        assert_eq!(model_mime_from_ext("stl"), "model/stl");
        assert_eq!(model_mime_from_ext("xyz"), "model/gltf-binary");
        assert!(is_model_extension(".GLB"));
        assert!(!is_model_extension("exe"));
        assert_eq!(mime_from_file_name("skeleton.zip"), "application/zip");
    }
}
