use super::*;

#[test]
fn parse_skips_comments_and_lowercases_keys() {
    let cfg = ConfigFile::parse(
        "# butterflow\n\nCRF = 20\npreset=slow # inline\n  Codec=libx264  \n",
    )
    .unwrap();
    assert_eq!(cfg.len(), 3);
    assert_eq!(cfg.get("crf"), Some("20"));
    assert_eq!(cfg.get("CRF"), Some("20"));
    assert_eq!(cfg.get("preset"), Some("slow"));
    assert_eq!(cfg.get("codec"), Some("libx264"));
}

#[test]
fn parse_rejects_lines_without_equals() {
    let err = ConfigFile::parse("crf=18\nnonsense\n").unwrap_err();
    assert!(err.to_string().contains("line 2"));
}

#[test]
fn missing_file_loads_empty() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = ConfigFile::load(&dir.path().join("nope")).unwrap();
    assert!(cfg.is_empty());
}

#[test]
fn save_replaces_file_and_reloads() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("config");

    let mut cfg = ConfigFile::new();
    cfg.set("Preset", "medium");
    cfg.set("crf", "16");
    cfg.save(&path, "generated").unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.starts_with("# generated\n"));

    cfg.set("crf", "17");
    cfg.save(&path, "generated").unwrap();
    let back = ConfigFile::load(&path).unwrap();
    assert_eq!(back.get("crf"), Some("17"));
    assert_eq!(back.get("preset"), Some("medium"));

    let leftovers = std::fs::read_dir(path.parent().unwrap()).unwrap().count();
    assert_eq!(leftovers, 1);
}
