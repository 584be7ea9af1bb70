//! Targets whose requirements are unmet.

use super::*;

#[cfg(unix)]
#[test]
fn missing_member_is_dropped() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write(
        "build.hm",
        "
target all
  virtual = true
  targets = pcap plain
target pcap
  requires = exists include/pcap.h
  command = touch pcap
target plain
  command = touch plain
",
    )?;
    let out = space.run_expect(&mut hashmake_command(vec![]))?;
    assert_output_contains(&out, "build plain\n");
    assert_output_not_contains(&out, "build pcap");
    assert!(!space.exists("pcap"));

    space.write("include/pcap.h", "")?;
    let out = space.run_expect(&mut hashmake_command(vec![]))?;
    assert_output_contains(&out, "build pcap\n");
    assert_output_not_contains(&out, "build plain");
    Ok(())
}

#[cfg(unix)]
#[test]
fn probe_requirement() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write(
        "build.hm",
        "
target yes
  requires = succeeds true
  command = touch yes
target no
  requires = succeeds false
  command = touch no
target gone
  requires = succeeds no-such-probe-for-hashmake
  command = touch gone
",
    )?;
    let out = space.run_expect(&mut hashmake_command(vec!["yes", "no", "gone"]))?;
    assert_output_contains(&out, "hashmake: ran 1 tasks, now up to date");
    assert!(space.exists("yes"));
    assert!(!space.exists("no"));
    assert!(!space.exists("gone"));
    Ok(())
}

#[cfg(unix)]
#[test]
fn missing_hard_dependency_skips_requested_target() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write(
        "build.hm",
        "
target lib
  requires = exists /nonexistent/hashmake/lib.h
  command = touch lib
target app
  deps = lib
  command = touch app
",
    )?;
    let out = space.run_expect(&mut hashmake_command(vec!["app"]))?;
    assert_output_contains(&out, "hashmake: no work to do");
    assert!(!space.exists("app"));
    Ok(())
}
