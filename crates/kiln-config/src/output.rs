//! Output location, filename patterns and manifest options.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputOptions {
    #[serde(default = "default_path")]
    pub path: PathBuf,

    /// Prefix prepended to emitted filenames in the manifest and asset URLs.
    #[serde(default = "default_public_path", alias = "publicPath")]
    pub public_path: String,

    /// Pattern for entry chunks. Placeholders: `[name]`, `[contenthash]`.
    #[serde(default = "default_filename")]
    pub filename: String,

    /// Pattern for async and shared chunks.
    #[serde(default = "default_chunk_filename", alias = "chunkFilename")]
    pub chunk_filename: String,

    /// Pattern for vendor chunks.
    #[serde(default = "default_vendor_filename", alias = "vendorFilename")]
    pub vendor_filename: String,

    /// Hex characters of the content hash kept in filenames.
    #[serde(
        default = "default_hash_length",
        alias = "hashLength",
        alias = "hashDigestLength",
        alias = "hash_digest_length"
    )]
    pub hash_length: usize,

    /// Subdirectory of `path` that receives asset modules.
    #[serde(default = "default_media_dir", alias = "mediaDir")]
    pub media_dir: String,

    /// Pattern for asset modules. Placeholders: `[name]`, `[ext]`, `[contenthash]`.
    #[serde(
        default = "default_asset_filename",
        alias = "assetFilename",
        alias = "assetModuleFilename",
        alias = "asset_module_filename"
    )]
    pub asset_filename: String,

    /// Manifest location, relative to `path`.
    #[serde(default = "default_manifest")]
    pub manifest: PathBuf,

    /// Write `.gz` siblings. Unset means "only in production".
    #[serde(default)]
    pub compress: Option<bool>,

    /// Emitted filenames that get a compressed sibling.
    #[serde(default = "default_compress_test", alias = "compressTest")]
    pub compress_test: String,
}

impl Default for OutputOptions {
    fn default() -> Self {
        Self {
            path: default_path(),
            public_path: default_public_path(),
            filename: default_filename(),
            chunk_filename: default_chunk_filename(),
            vendor_filename: default_vendor_filename(),
            hash_length: default_hash_length(),
            media_dir: default_media_dir(),
            asset_filename: default_asset_filename(),
            manifest: default_manifest(),
            compress: None,
            compress_test: default_compress_test(),
        }
    }
}

fn default_path() -> PathBuf {
    PathBuf::from("dist")
}

fn default_public_path() -> String {
    "/".to_string()
}

fn default_filename() -> String {
    "[name].[contenthash].js".to_string()
}

fn default_chunk_filename() -> String {
    "[name].[contenthash].chunk.js".to_string()
}

fn default_vendor_filename() -> String {
    "[name].[contenthash].vendor.js".to_string()
}

fn default_hash_length() -> usize {
    8
}

fn default_media_dir() -> String {
    "media".to_string()
}

fn default_asset_filename() -> String {
    "[name].[ext]".to_string()
}

fn default_manifest() -> PathBuf {
    PathBuf::from("manifest.json")
}

fn default_compress_test() -> String {
    r"\.(js|ts|tsx)$".to_string()
}
