//! Exit status and failure reporting.

use super::*;

#[cfg(unix)]
#[test]
fn failed_action_reports_command() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write(
        "build.hm",
        "
target leaf
  command = sh -c exit$ 3
target top
  deps = leaf
  command = touch top
",
    )?;
    let out = space.run(&mut hashmake_command(vec!["top"]))?;
    assert_eq!(out.status.code(), Some(3));
    assert_output_contains(&out, "failed: leaf\nsh -c exit 3\n");
    assert_output_not_contains(&out, "build top");
    assert_output_not_contains(&out, "now up to date");
    assert!(!space.exists("top"));

    // The status file is still written, recording nothing as good.
    let status: serde_json::Value =
        serde_json::from_slice(&space.read(".hashmake_status.json")?)?;
    assert!(status["leaf"].is_null());
    assert!(status["top"].is_null());
    Ok(())
}

#[cfg(unix)]
#[test]
fn exit_codes_are_ored() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write(
        "build.hm",
        "
target two
  command = sh -c exit$ 2
target four
  command = sh -c exit$ 4
",
    )?;
    let out = space.run(&mut hashmake_command(vec!["two", "four"]))?;
    // "four" never starts once "two" has failed, and counts as code 1.
    assert_eq!(out.status.code(), Some(3));
    assert_output_not_contains(&out, "build four");
    Ok(())
}

#[test]
fn missing_program_is_a_failure() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write(
        "build.hm",
        "target x\n  command = no-such-program-for-hashmake\n",
    )?;
    let out = space.run(&mut hashmake_command(vec!["x"]))?;
    assert_eq!(out.status.code(), Some(1));
    assert_output_contains(&out, "failed: x\n");
    assert_output_contains(&out, "spawn no-such-program-for-hashmake");
    Ok(())
}

#[test]
fn unknown_target() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write("build.hm", "target x\n")?;
    let out = space.run(&mut hashmake_command(vec!["y"]))?;
    assert_eq!(out.status.code(), Some(1));
    assert_output_contains(&out, "hashmake: error: unknown target \"y\"");
    Ok(())
}

#[test]
fn cycle() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write("build.hm", "target a\n  deps = b\ntarget b\n  deps = a\n")?;
    let out = space.run(&mut hashmake_command(vec!["a"]))?;
    assert_eq!(out.status.code(), Some(1));
    assert_output_contains(&out, "dependency cycle: a -> b -> a");
    Ok(())
}
