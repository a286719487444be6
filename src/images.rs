//! Lists the photos in a place's `pics` directory and links them from the
//! page.

use log::warn;
use std::path::{Path, PathBuf};
use url::Url;
use walkdir::WalkDir;

const IMAGE_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "gif", "webp"];

/// Returns the image files directly inside `root/dir`, sorted by file name.
/// A missing or unreadable directory yields no images.
pub fn discover_images(root: &Path, dir: &str) -> Vec<PathBuf> {
    let abs = root.join(dir);
    if !abs.is_dir() {
        warn!("Image directory '{}' does not exist", abs.display());
        return Vec::new();
    }

    let mut images = Vec::new();
    for result in WalkDir::new(&abs)
        .min_depth(1)
        .max_depth(1)
        .sort_by(|a, b| a.file_name().cmp(b.file_name()))
    {
        let entry = match result {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Reading image directory '{}': {}", abs.display(), e);
                continue;
            }
        };
        if !entry.file_type().is_file() || !is_image(entry.path()) {
            continue;
        }
        images.push(entry.into_path());
    }
    images
}

/// Turns image files into links that work from the directory the page is
/// written to.
pub struct Links {
    page_dir: Option<Url>,
}

impl Links {
    /// Links relative to the directory holding `page_file`. A relative
    /// `page_file` is taken from the current directory, the same way the
    /// page itself gets written.
    pub fn new(page_file: &Path) -> Links {
        let page_file = absolute(page_file);
        Links {
            page_dir: page_file
                .parent()
                .and_then(|dir| Url::from_directory_path(dir).ok()),
        }
    }

    /// Returns the link to `image`: a relative URL from the page directory,
    /// or an absolute `file://` URL when no relative one exists.
    pub fn link(&self, image: &Path) -> String {
        let target = match Url::from_file_path(absolute(image)) {
            Ok(target) => target,
            Err(()) => return image.to_string_lossy().replace('\\', "/"),
        };
        match self.page_dir.as_ref().and_then(|dir| dir.make_relative(&target)) {
            Some(relative) => relative,
            None => target.to_string(),
        }
    }

    pub fn links(&self, images: &[PathBuf]) -> Vec<String> {
        images.iter().map(|image| self.link(image)).collect()
    }
}

// Lexically absolute: `.` components are dropped and symlinks are left alone,
// so a page and its images under the same root agree on the prefix.
fn absolute(path: &Path) -> PathBuf {
    let path = if path.is_absolute() {
        path.to_owned()
    } else {
        match std::env::current_dir() {
            Ok(dir) => dir.join(path),
            Err(_) => path.to_owned(),
        }
    };
    path.components().collect()
}

fn is_image(path: &Path) -> bool {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => IMAGE_EXTENSIONS
            .iter()
            .any(|known| known.eq_ignore_ascii_case(ext)),
        None => false,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::fs;

    #[test]
    fn test_discover_images() -> std::io::Result<()> {
        let root = tempfile::tempdir()?;
        let dir = root.path().join("pics").join("munji");
        fs::create_dir_all(dir.join("nested"))?;
        for name in &["c.webp", "a.JPG", "notes.txt", "b.png", "README", "nested/d.jpg"] {
            fs::write(dir.join(name), b"")?;
        }

        assert_eq!(
            vec![dir.join("a.JPG"), dir.join("b.png"), dir.join("c.webp")],
            discover_images(root.path(), "pics/munji/")
        );
        Ok(())
    }

    #[test]
    fn test_links() {
        let image = Path::new("/lunch/pics/ovanos/pasta 1.jpg");

        let beside = Links::new(Path::new("/lunch/map.html"));
        assert_eq!("pics/ovanos/pasta%201.jpg", beside.link(image));

        let nested = Links::new(Path::new("/lunch/out/map.html"));
        assert_eq!("../pics/ovanos/pasta%201.jpg", nested.link(image));

        let dotted = Links::new(Path::new("/lunch/./site/./map.html"));
        assert_eq!("../pics/ovanos/pasta%201.jpg", dotted.link(image));
    }

    #[test]
    fn test_relative_page_path() -> std::io::Result<()> {
        let cwd = std::env::current_dir()?;
        let image = cwd.join("pics").join("a.jpg");
        assert_eq!("../pics/a.jpg", Links::new(Path::new("out/map.html")).link(&image));
        assert_eq!("pics/a.jpg", Links::new(Path::new("map.html")).link(&image));
        Ok(())
    }

    #[test]
    fn test_discover_images_missing_or_empty() -> std::io::Result<()> {
        let root = tempfile::tempdir()?;
        assert!(discover_images(root.path(), "pics/nowhere").is_empty());

        fs::create_dir(root.path().join("empty"))?;
        assert!(discover_images(root.path(), "empty").is_empty());

        fs::write(root.path().join("file.jpg"), b"")?;
        assert!(discover_images(root.path(), "file.jpg").is_empty());
        Ok(())
    }
}
