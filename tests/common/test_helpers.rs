use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tokio::fs;

/// A package laid out in a temporary directory: `<temp>/jcr_root/...` plus `META-INF`.
pub struct PackageFixture {
    temp_dir: TempDir,
}

impl PackageFixture {
    pub async fn new() -> std::io::Result<Self> {
        let temp_dir = TempDir::new()?;
        fs::create_dir_all(temp_dir.path().join("jcr_root")).await?;
        fs::create_dir_all(temp_dir.path().join("META-INF/vault")).await?;
        fs::write(
            temp_dir.path().join("META-INF/vault/filter.xml"),
            r#"<?xml version="1.0" encoding="UTF-8"?>
<workspaceFilter version="1.0"><filter root="/content/site"/></workspaceFilter>"#,
        )
        .await?;
        Ok(Self { temp_dir })
    }

    /// Package directory (parent of `jcr_root`).
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn jcr_root(&self) -> PathBuf {
        self.temp_dir.path().join("jcr_root")
    }

    /// Write a file below `jcr_root`, creating parent directories.
    pub async fn write(&self, relative: &str, content: impl AsRef<[u8]>) -> std::io::Result<()> {
        let path = self.jcr_root().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(path, content).await
    }
}

pub const SITE_CONTENT_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<jcr:root xmlns:jcr="http://www.jcp.org/jcr/1.0" xmlns:cq="http://www.day.com/jcr/cq/1.0"
    jcr:primaryType="cq:Page">
    <jcr:content
        jcr:primaryType="nt:unstructured"
        jcr:title="Site">
        <par jcr:primaryType="nt:unstructured">
            <text jcr:primaryType="nt:unstructured" text="Hello"/>
            <text jcr:primaryType="nt:unstructured" text="World"/>
        </par>
    </jcr:content>
</jcr:root>
"#;

pub const TRUNCATED_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<jcr:root xmlns:jcr="http://www.jcp.org/jcr/1.0" jcr:primaryType="nt:folder">
    <a jcr:primaryType="nt:unstructured">
        <b jcr:primaryType="nt:unstructured"
"#;

pub const CONFLICTED_TXT: &str = "line one\n<<<<<<< HEAD\nours\n=======\ntheirs\n>>>>>>> feature\n";

/// A small but realistic package:
///
/// - `content/site/.content.xml`: well-formed page with same-name siblings
/// - `content/site/broken/.content.xml`: truncated in the middle of a start tag
/// - `apps/site/readme.txt`: opaque file with merge conflict markers
/// - `content/site/logo.png`: opaque binary
pub async fn create_sample_package() -> std::io::Result<PackageFixture> {
    let package = PackageFixture::new().await?;
    package
        .write("content/site/.content.xml", SITE_CONTENT_XML)
        .await?;
    package
        .write("content/site/broken/.content.xml", TRUNCATED_XML)
        .await?;
    package.write("apps/site/readme.txt", CONFLICTED_TXT).await?;
    package
        .write("content/site/logo.png", [0x89u8, b'P', b'N', b'G', 0x0d, 0x0a])
        .await?;
    Ok(package)
}
