use anyhow::Result;
use netdispatch::dispatch::{DeviceResult, FailureKind};
use netdispatch::router::{host_prefixed_path, FileMode, OutputDestination, ResultRouter};
use std::fs;
use std::path::PathBuf;

fn file_router(mode: FileMode, path: PathBuf) -> ResultRouter<Vec<u8>> {
    ResultRouter::with_console(OutputDestination::File { mode, path }, Vec::new())
}

#[tokio::test]
async fn test_console_payload_is_verbatim() -> Result<()> {
    let result = DeviceResult::success("10.0.0.1", "Hostname: r1\nModel: mx480\n", 12);
    let mut router = ResultRouter::with_console(OutputDestination::Console, Vec::new());

    router.route(&result).await;

    assert_eq!(String::from_utf8(router.into_console())?, result.payload);
    Ok(())
}

#[tokio::test]
async fn test_multiple_mode_one_file_per_host() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let base = dir.path().join("out.txt");
    let mut router = file_router(FileMode::Multiple, base.clone());

    let first = DeviceResult::success("10.0.0.1", "alpha", 5);
    let second = DeviceResult::failure("10.0.0.2", FailureKind::Connection, "refused", 5);
    router.route(&first).await;
    router.route(&second).await;

    let first_path = dir.path().join("10.0.0.1_out.txt");
    let second_path = dir.path().join("10.0.0.2_out.txt");
    assert_eq!(fs::read_to_string(&first_path)?, first.payload);
    assert_eq!(fs::read_to_string(&second_path)?, second.payload);
    assert!(!base.exists());

    let console = String::from_utf8(router.into_console())?;
    assert!(console.contains(&format!("10.0.0.1 output appended to: {}", first_path.display())));
    assert!(console.contains(&format!("10.0.0.2 output appended to: {}", second_path.display())));
    Ok(())
}

#[tokio::test]
async fn test_single_mode_appends_every_host() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("all.txt");
    fs::write(&path, "previous run\n")?;
    let mut router = file_router(FileMode::Single, path.clone());

    let first = DeviceResult::success("r1", "one", 1);
    let second = DeviceResult::success("r2", "two", 1);
    router.route(&first).await;
    router.route(&second).await;

    let contents = fs::read_to_string(&path)?;
    assert_eq!(
        contents,
        format!("previous run\n{}{}", first.payload, second.payload)
    );
    Ok(())
}

#[tokio::test]
async fn test_unwritable_file_falls_back_to_console() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("missing").join("out.txt");
    let mut router = file_router(FileMode::Single, path.clone());

    let result = DeviceResult::success("r1", "show version output", 3);
    router.route(&result).await;

    let console = String::from_utf8(router.into_console())?;
    assert!(console.contains("Could not open output file"));
    assert!(console.contains(&path.display().to_string()));
    assert!(console.ends_with(&format!("Output would have been:\n{}", result.payload)));
    Ok(())
}

#[test]
fn test_host_prefixed_paths() {
    assert_eq!(
        host_prefixed_path(&PathBuf::from("/tmp/out.txt"), "10.0.0.1"),
        PathBuf::from("/tmp/10.0.0.1_out.txt")
    );
    assert_eq!(
        host_prefixed_path(&PathBuf::from("out.txt"), "r2"),
        PathBuf::from("r2_out.txt")
    );

    let destination = OutputDestination::File {
        mode: FileMode::Single,
        path: PathBuf::from("/tmp/out.txt"),
    };
    assert_eq!(destination.path_for("r9"), Some(PathBuf::from("/tmp/out.txt")));
    assert_eq!(OutputDestination::Console.path_for("r9"), None);
}
