//! Basic asset loading example.
//!
//! This example shows:
//! - Registering a synchronous and an asynchronous loader
//! - A material that depends on two textures
//! - Driving the manager with `update` while printing progress
//! - Reference counts and unloading
//!
//! Run with `RUST_LOG=hoard_assets=debug` to see the loading pipeline.

use std::sync::Arc;
use std::thread;

use hoard_assets::prelude::*;

/// A decoded "texture": just its dimensions.
#[derive(Debug)]
struct Texture {
    width: u32,
    height: u32,
}

impl Asset for Texture {
    fn type_name() -> &'static str {
        "Texture"
    }
}

/// Decodes `WIDTHxHEIGHT` off the driving thread.
struct TextureLoader;

impl AsyncAssetLoader for TextureLoader {
    type Asset = Texture;
    type Staged = (u32, u32);

    fn load_async(&self, request: &LoadRequest) -> AssetResult<(u32, u32)> {
        let text = request.handle().read_string()?;
        let (w, h) = text
            .trim()
            .split_once('x')
            .ok_or_else(|| AssetError::loader(request.name(), "expected WIDTHxHEIGHT"))?;
        let parse = |s: &str| {
            s.parse::<u32>()
                .map_err(|e| AssetError::loader(request.name(), e.to_string()))
        };
        // Pretend decoding is expensive.
        thread::sleep(std::time::Duration::from_millis(20));
        Ok((parse(w)?, parse(h)?))
    }

    fn load_sync(
        &self,
        _ctx: &LoadContext<'_>,
        (width, height): (u32, u32),
    ) -> AssetResult<Texture> {
        Ok(Texture { width, height })
    }
}

/// A material referencing textures by name.
#[derive(Debug)]
struct Material {
    albedo: Arc<Texture>,
    normal: Arc<Texture>,
}

impl Asset for Material {
    fn type_name() -> &'static str {
        "Material"
    }
}

/// Reads `albedo=...` and `normal=...` lines.
struct MaterialLoader;

fn texture_names(text: &str) -> AssetResult<(String, String)> {
    let mut albedo = None;
    let mut normal = None;
    for line in text.lines() {
        match line.split_once('=') {
            Some(("albedo", name)) => albedo = Some(name.trim().to_string()),
            Some(("normal", name)) => normal = Some(name.trim().to_string()),
            _ => {}
        }
    }
    match (albedo, normal) {
        (Some(albedo), Some(normal)) => Ok((albedo, normal)),
        _ => Err(AssetError::Other {
            message: "material needs albedo and normal".to_string(),
        }),
    }
}

impl SyncAssetLoader for MaterialLoader {
    type Asset = Material;

    fn dependencies(&self, request: &LoadRequest) -> AssetResult<Option<Vec<AssetDescriptor>>> {
        let (albedo, normal) = texture_names(&request.handle().read_string()?)?;
        Ok(Some(vec![
            AssetDescriptor::new::<Texture>(albedo),
            AssetDescriptor::new::<Texture>(normal),
        ]))
    }

    fn load(&self, ctx: &LoadContext<'_>) -> AssetResult<Material> {
        let (albedo, normal) = texture_names(&ctx.handle().read_string()?)?;
        Ok(Material {
            albedo: ctx.get::<Texture>(&albedo)?,
            normal: ctx.get::<Texture>(&normal)?,
        })
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    hoard_core::logging::init();

    let resolver = MemoryResolver::new()
        .with("textures/brick.tex", b"256x256".to_vec())
        .with("textures/brick_n.tex", b"256x256".to_vec())
        .with("textures/moss.tex", b"128x64".to_vec())
        .with(
            "materials/wall.mat",
            b"albedo=textures/brick.tex\nnormal=textures/brick_n.tex".to_vec(),
        )
        .with(
            "materials/mossy.mat",
            b"albedo=textures/moss.tex\nnormal=textures/brick_n.tex".to_vec(),
        );

    let mut manager = AssetManager::new(resolver);
    manager.set_async_loader(None, TextureLoader);
    manager.set_loader(None, MaterialLoader);

    println!("\n=== Loading Assets ===\n");

    manager.load::<Material>("materials/wall.mat")?;
    manager.load::<Material>("materials/mossy.mat")?;

    hoard_core::profiling::set_enabled(true);
    while !manager.update()? {
        hoard_core::profiling::new_frame();
        print!("\rprogress: {:>5.1}%", manager.progress() * 100.0);
        thread::yield_now();
    }
    println!("\rprogress: 100.0%");

    let wall = manager.get::<Material>("materials/wall.mat")?;
    println!(
        "wall: albedo {}x{}, normal {}x{}",
        wall.albedo.width, wall.albedo.height, wall.normal.width, wall.normal.height
    );

    println!("\n=== Diagnostics ===\n");
    print!("{}", manager.diagnostics());

    println!("\n=== Unloading ===\n");
    manager.unload("materials/wall.mat")?;
    println!("after unloading wall: {:?}", manager.asset_names());
    println!(
        "shared normal map references: {}",
        manager.reference_count("textures/brick_n.tex")?
    );

    manager.dispose();
    println!("loaded after dispose: {}", manager.loaded_count());
    Ok(())
}
