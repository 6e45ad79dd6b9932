use super::*;

#[test]
fn temp_names_carry_the_pid() {
    let cache = CacheDir::new("/tmp/bf");
    let p = cache.temp_path("My Clip", "MP4");
    let name = p.file_name().unwrap().to_string_lossy().into_owned();
    assert_eq!(name, format!("~my clip.{}.mp4", std::process::id()));
    assert_eq!(cache.kernel_dir(), Path::new("/tmp/bf/kernels"));
}

#[test]
fn usage_skips_kernels_and_clear_removes_everything() {
    let dir = tempfile::tempdir().unwrap();
    let cache = CacheDir::new(dir.path().join("cache"));
    assert_eq!(cache.usage().unwrap(), CacheUsage::default());
    assert!(!cache.clear().unwrap());

    cache.ensure().unwrap();
    std::fs::create_dir_all(cache.kernel_dir()).unwrap();
    std::fs::write(cache.kernel_dir().join("k.json"), b"{}").unwrap();
    std::fs::write(cache.root().join("a.mp4"), [0u8; 100]).unwrap();
    std::fs::create_dir_all(cache.root().join("sub")).unwrap();
    std::fs::write(cache.root().join("sub").join("b.m4a"), [0u8; 28]).unwrap();

    assert_eq!(
        cache.usage().unwrap(),
        CacheUsage {
            files: 2,
            bytes: 128
        }
    );
    assert!(cache.clear().unwrap());
    assert!(!cache.root().exists());
}

#[test]
fn human_size_picks_a_unit() {
    assert_eq!(CacheUsage { files: 1, bytes: 512 }.human_size(), "512 B");
    assert_eq!(
        CacheUsage {
            files: 1,
            bytes: 3 * 1024 * 1024 / 2
        }
        .human_size(),
        "1.50 MB"
    );
}

#[test]
fn configured_root_wins() {
    let c = CacheDir::resolve(Some(Path::new("/srv/cache")));
    assert_eq!(c.root(), Path::new("/srv/cache"));
    assert!(CacheDir::resolve(None).root().to_string_lossy().ends_with("cache"));
}
