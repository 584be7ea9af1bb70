//! Build modes and their command-line selection.

use super::*;

#[cfg(unix)]
const STAMPS: &str = "
mode debug = debug.stamp
mode release = release.stamp
target stamp
  virtual = true
  command = touch $mode
target release-only
  virtual = true
  requires = mode release
  command = touch release-only
";

#[cfg(unix)]
#[test]
fn mode_selects_tokens() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write("build.hm", STAMPS)?;
    space.run_expect(&mut hashmake_command(vec!["stamp", "release-only"]))?;
    assert!(space.exists("debug.stamp"));
    assert!(!space.exists("release.stamp"));
    assert!(!space.exists("release-only"));

    space.run_expect(&mut hashmake_command(vec!["-m", "release", "stamp", "release-only"]))?;
    assert!(space.exists("release.stamp"));
    assert!(space.exists("release-only"));
    Ok(())
}

#[cfg(unix)]
#[test]
fn unknown_mode() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write("build.hm", STAMPS)?;
    let out = space.run(&mut hashmake_command(vec!["-m", "fast", "stamp"]))?;
    assert_eq!(out.status.code(), Some(1));
    assert_output_contains(&out, "hashmake: error: unknown mode \"fast\"");
    Ok(())
}

#[test]
fn list_modes() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write("build.hm", "mode asan = -fsanitize=address\ntarget all\n")?;
    let out = space.run_expect(&mut hashmake_command(vec!["-t", "modes"]))?;
    assert_eq!(std::str::from_utf8(&out.stdout)?, "debug\nrelease\nasan\n");
    Ok(())
}
