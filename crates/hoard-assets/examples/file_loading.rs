//! Loading assets from disk.
//!
//! This example demonstrates:
//! - `FileResolver` rooted at a directory
//! - Picking loaders by file suffix
//! - Recovering from a failed load with an error listener
//! - Blocking helpers `finish_loading_asset` and `update_for`

use std::time::Duration;

use hoard_assets::prelude::*;

/// Plain text file.
#[derive(Debug)]
struct Text(String);

impl Asset for Text {
    fn type_name() -> &'static str {
        "Text"
    }
}

struct TextLoader;

impl SyncAssetLoader for TextLoader {
    type Asset = Text;

    fn load(&self, ctx: &LoadContext<'_>) -> AssetResult<Text> {
        Ok(Text(ctx.handle().read_string()?))
    }
}

/// Same asset type, but shouts.
struct ShoutLoader;

impl AsyncAssetLoader for ShoutLoader {
    type Asset = Text;
    type Staged = String;

    fn load_async(&self, request: &LoadRequest) -> AssetResult<String> {
        Ok(request.handle().read_string()?.to_uppercase())
    }

    fn load_sync(&self, _ctx: &LoadContext<'_>, staged: String) -> AssetResult<Text> {
        Ok(Text(staged))
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    hoard_core::logging::init_with_filter("hoard_assets=debug,info");

    let temp_dir = tempfile::tempdir()?;
    std::fs::write(temp_dir.path().join("readme.txt"), "hello from disk")?;
    std::fs::write(temp_dir.path().join("alert.shout"), "mind the gap")?;
    println!("Assets in {}", temp_dir.path().display());

    let mut manager = AssetManager::new(FileResolver::new(temp_dir.path()));
    manager.set_loader(None, TextLoader);
    manager.set_async_loader(Some(".shout"), ShoutLoader);
    manager.set_error_listener(|desc: &AssetDescriptor, err: &AssetError| {
        eprintln!("could not load {}: {}", desc, err);
    });

    manager.load::<Text>("readme.txt")?;
    manager.load::<Text>("missing.txt")?;
    manager.load::<Text>("alert.shout")?;

    manager.finish_loading_asset("readme.txt")?;
    println!("readme.txt: {}", manager.get::<Text>("readme.txt")?.0);

    while !manager.update_for(Duration::from_millis(5))? {}

    println!("alert.shout: {}", manager.get::<Text>("alert.shout")?.0);
    println!("missing.txt state: {:?}", manager.load_state("missing.txt"));

    manager.dispose();
    Ok(())
}
