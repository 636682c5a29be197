fn main() {
    ensure_windows_icon();
    tauri_build::build()
}

/// The Windows resource compiler needs `icons/icon.ico`; derive it from the
/// PNG so only one icon is kept in the tree.
fn ensure_windows_icon() {
    if !cfg!(target_os = "windows") {
        return;
    }

    let Ok(manifest_dir) = std::env::var("CARGO_MANIFEST_DIR") else {
        return;
    };
    let icons_dir = std::path::PathBuf::from(manifest_dir).join("icons");
    let source_png = icons_dir.join("icon.png");
    let dest_ico = icons_dir.join("icon.ico");
    println!("cargo:rerun-if-changed={}", source_png.display());

    if dest_ico.exists() {
        return;
    }

    let img = match image::open(&source_png) {
        Ok(i) => i.to_rgba8(),
        Err(e) => {
            println!("cargo:warning=cliky-tauri build: failed to read icon PNG: {e}");
            return;
        }
    };

    let (w, h) = img.dimensions();
    let icon_image = ico::IconImage::from_rgba_data(w, h, img.into_raw());

    let mut dir = ico::IconDir::new(ico::ResourceType::Icon);
    match ico::IconDirEntry::encode(&icon_image) {
        Ok(entry) => dir.add_entry(entry),
        Err(e) => {
            println!("cargo:warning=cliky-tauri build: failed to encode ICO: {e}");
            return;
        }
    }

    match std::fs::File::create(&dest_ico) {
        Ok(mut file) => {
            if let Err(e) = dir.write(&mut file) {
                println!("cargo:warning=cliky-tauri build: failed to write ICO: {e}");
            }
        }
        Err(e) => println!("cargo:warning=cliky-tauri build: failed to create ICO file: {e}"),
    }
}
