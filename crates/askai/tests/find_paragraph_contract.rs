use std::path::Path;

fn askai(pages_dir: &Path) -> std::process::Command {
    let mut cmd = std::process::Command::new(assert_cmd::cargo::cargo_bin!("askai"));
    cmd.env_remove("ASKAI_ENV_FILE")
        .env_remove("ASKAI_WIKI_URL")
        .env("ASKAI_PAGES_DIR", pages_dir);
    cmd
}

fn write_pages(dir: &Path) {
    std::fs::write(
        dir.join("Some_page.html"),
        "<html><body>\
         <p>The river rises in the northern hills.</p>\
         <p>It flows south through three market towns.</p>\
         <p>Its delta is a protected wetland.</p>\
         </body></html>",
    )
    .expect("write Some_page.html");
}

#[test]
fn find_paragraph_contract_json() {
    let tmp = tempfile::tempdir().expect("tempdir");
    write_pages(tmp.path());

    let out = askai(tmp.path())
        .args([
            "find-paragraph",
            "--page",
            "Some page",
            "--snippet",
            "flows south through three market towns",
        ])
        .output()
        .expect("run askai find-paragraph");
    assert!(out.status.success(), "find-paragraph failed");

    let v: serde_json::Value = serde_json::from_slice(&out.stdout).expect("parse json");
    assert_eq!(v["schema_version"].as_u64(), Some(1));
    assert_eq!(v["kind"].as_str(), Some("find_paragraph"));
    assert_eq!(v["ok"].as_bool(), Some(true));
    assert_eq!(v["found"].as_bool(), Some(true));
    assert_eq!(v["reference"].as_str(), Some("Some page#p1"));
    assert_eq!(v["par_numbers"].as_str(), Some("1"));
    assert_eq!(v["paragraph_count"].as_u64(), Some(3));
}

#[test]
fn find_paragraph_text_output_is_the_reference() {
    let tmp = tempfile::tempdir().expect("tempdir");
    write_pages(tmp.path());

    let out = askai(tmp.path())
        .args([
            "find-paragraph",
            "--page",
            "Some page",
            "--snippet",
            "Its delta is a protected wetland",
            "--output",
            "text",
        ])
        .output()
        .expect("run askai find-paragraph --output text");
    assert!(out.status.success());
    assert_eq!(String::from_utf8_lossy(&out.stdout).trim(), "Some page#p2");
}

#[test]
fn find_paragraphs_contract_splits_found_and_notfound() {
    let tmp = tempfile::tempdir().expect("tempdir");
    write_pages(tmp.path());

    let out = askai(tmp.path())
        .args([
            "find-paragraphs",
            "--json",
            r#"{"Some page":"The river rises in the northern hills","Missing page":"anything at all"}"#,
        ])
        .output()
        .expect("run askai find-paragraphs");
    assert!(out.status.success(), "find-paragraphs failed");

    let v: serde_json::Value = serde_json::from_slice(&out.stdout).expect("parse json");
    assert_eq!(v["kind"].as_str(), Some("find_paragraphs"));
    assert_eq!(v["found"], serde_json::json!(["Some page#p0"]));
    assert_eq!(v["notfound"], serde_json::json!(["Missing page"]));
}

#[test]
fn find_paragraphs_rejects_invalid_json() {
    let tmp = tempfile::tempdir().expect("tempdir");

    let out = askai(tmp.path())
        .args(["find-paragraphs", "--json", "[1,2,3]"])
        .output()
        .expect("run askai find-paragraphs");
    assert!(!out.status.success());

    let v: serde_json::Value = serde_json::from_slice(&out.stdout).expect("parse json");
    assert_eq!(v["ok"].as_bool(), Some(false));
    assert_eq!(v["error"]["code"].as_str(), Some("invalid_params"));
    assert_eq!(v["schema_version"].as_u64(), Some(1));
}

#[test]
fn find_paragraph_rejects_path_like_page_names() {
    let tmp = tempfile::tempdir().expect("tempdir");

    let out = askai(tmp.path())
        .args(["find-paragraph", "--page", "../etc/passwd", "--snippet", "root"])
        .output()
        .expect("run askai find-paragraph");
    assert!(!out.status.success());

    let v: serde_json::Value = serde_json::from_slice(&out.stdout).expect("parse json");
    assert_eq!(v["error"]["code"].as_str(), Some("invalid_page"));
}
