use crate::e2e::*;

#[test]
fn empty_file() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write("build.hm", "target all\n  virtual = true\n")?;
    let out = space.run(&mut hashmake_command(vec![]))?;
    assert_eq!(
        std::str::from_utf8(&out.stdout)?,
        "plan all\nhashmake: no work to do\n"
    );
    Ok(())
}

#[test]
fn no_target() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write("build.hm", "target x\n")?;
    let out = space.run(&mut hashmake_command(vec![]))?;
    assert_eq!(out.status.code(), Some(1));
    assert_output_contains(&out, "hashmake: error: no target specified and no default");
    Ok(())
}

#[cfg(unix)]
#[test]
fn basic_rebuild() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write("build.hm", CHAIN)?;
    space.write("leaf.txt", "v1")?;

    let out = space.run_expect(&mut hashmake_command(vec!["top"]))?;
    assert_output_contains(&out, "plan top\nplan mid\nplan leaf\n");
    assert_output_contains(&out, "build leaf\nbuild mid\nbuild top\n");
    assert_output_contains(&out, "hashmake: ran 3 tasks, now up to date");
    assert_eq!(space.read("top")?, b"v1");

    let status: serde_json::Value = serde_json::from_slice(&space.read(".hashmake_status.json")?)?;
    let status = status.as_object().expect("status is an object");
    assert_eq!(status.len(), 3);
    assert!(status["leaf"].is_string());

    let out = space.run_expect(&mut hashmake_command(vec!["top"]))?;
    assert_output_contains(&out, "hashmake: no work to do");
    assert_output_not_contains(&out, "build ");
    Ok(())
}

#[cfg(unix)]
#[test]
fn source_change_propagates() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write("build.hm", CHAIN)?;
    space.write("leaf.txt", "v1")?;
    space.run_expect(&mut hashmake_command(vec!["top"]))?;

    space.write("leaf.txt", "v2")?;
    let out = space.run_expect(&mut hashmake_command(vec!["top"]))?;
    assert_output_contains(&out, "hashmake: ran 3 tasks, now up to date");
    assert_eq!(space.read("top")?, b"v2");
    Ok(())
}

#[cfg(unix)]
#[test]
fn default_and_setup() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write(
        "build.hm",
        "
default stamp
target setup
  virtual = true
  command = mkdir -p out
target stamp
  out = out/stamp
  command = touch out/stamp
target other
  command = touch other
",
    )?;
    let out = space.run_expect(&mut hashmake_command(vec![]))?;
    assert_output_contains(&out, "build setup\nbuild stamp\n");
    assert!(space.exists("out/stamp"));
    assert!(!space.exists("other"));
    Ok(())
}

#[cfg(unix)]
#[test]
fn verbose_prints_command() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write("build.hm", "target x\n  command = touch x\n")?;
    let out = space.run_expect(&mut hashmake_command(vec!["-v", "x"]))?;
    assert_output_contains(&out, "touch x\n");
    Ok(())
}

#[cfg(unix)]
#[test]
fn stdin_feed() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write(
        "build.hm",
        "
target jumbo.c
  sources = a.c b.c
  stdin = a.c b.c
  command = sh -c cat$ >$ jumbo.c
",
    )?;
    space.write("a.c", "int a;\n")?;
    space.write("b.c", "int b;\n")?;
    space.run_expect(&mut hashmake_command(vec!["-j", "jumbo.c"]))?;
    assert_eq!(space.read("jumbo.c")?, b"int a;\nint b;\n");
    Ok(())
}

#[test]
fn list_targets() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write(
        "build.hm",
        "target all\n  virtual = true\n  doc = Everything\ntarget x\n",
    )?;
    let out = space.run_expect(&mut hashmake_command(vec!["-t", "targets"]))?;
    assert_eq!(std::str::from_utf8(&out.stdout)?, "all [virtual]: Everything\nx\n");
    Ok(())
}

#[test]
fn tool_listings_exit_zero() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    let out = space.run_expect(&mut hashmake_command(vec!["-d", "list"]))?;
    assert_output_contains(&out, "trace");
    let out = space.run_expect(&mut hashmake_command(vec!["-t", "list"]))?;
    assert_output_contains(&out, "modes");
    Ok(())
}

#[test]
fn parse_error() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write("build.hm", "target a\n  command = $(cc\n")?;
    let out = space.run(&mut hashmake_command(vec!["a"]))?;
    assert_eq!(out.status.code(), Some(1));
    assert_output_contains(&out, "hashmake: error: parse error: unterminated $(");
    Ok(())
}
