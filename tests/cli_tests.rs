use std::fs;
use std::path::PathBuf;
use std::process::Command;

use webidl_bind::ast::{EnumDecl, File, InterfaceDecl, Member, SyntaxType};

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("webidl_bind_{}_{}", name, std::process::id()));
    fs::create_dir_all(&dir).unwrap();
    dir
}

fn write_tree(dir: &PathBuf, file: &File) -> PathBuf {
    let path = dir.join(format!("{}.json", file.name));
    fs::write(&path, serde_json::to_string(file).unwrap()).unwrap();
    path
}

fn binary() -> Command {
    Command::new(env!("CARGO_BIN_EXE_webidl_bind"))
}

#[test]
fn test_cli_writes_model_json() {
    let dir = scratch_dir("ok");
    let tree = write_tree(
        &dir,
        &File::new("canvas")
            .with(
                InterfaceDecl::new("Canvas")
                    .member(Member::attribute("fillRule", SyntaxType::named("CanvasFillRule"))),
            )
            .with(EnumDecl::new("CanvasFillRule", ["nonzero", "evenodd"])),
    );
    let script = dir.join("canvas.tr");
    fs::write(&script, "@on enum ^Canvas .prefix = Canvas\n").unwrap();
    let output = dir.join("model.json");

    let status = binary()
        .arg(&tree)
        .arg("--transform")
        .arg(&script)
        .arg("--output")
        .arg(&output)
        .status()
        .unwrap();
    assert!(status.success());

    let json: serde_json::Value = serde_json::from_str(&fs::read_to_string(&output).unwrap()).unwrap();
    let canvas = &json["packages"]["canvas"];
    assert_eq!(canvas["interfaces"].as_array().unwrap().len(), 1);
    let enum_id = canvas["enums"][0].as_u64().unwrap() as usize;
    assert_eq!(json["model"]["entities"][enum_id]["prefix"], "Canvas");
}

#[test]
fn test_cli_fails_on_errors() {
    let dir = scratch_dir("err");
    let tree = write_tree(
        &dir,
        &File::new("broken")
            .with(InterfaceDecl::new("Node").member(Member::attribute("owner", SyntaxType::named("Nod")))),
    );

    let output = binary().arg(&tree).output().unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("error[E006]: unresolved type `Nod`"));
    assert!(output.stdout.is_empty());
}
