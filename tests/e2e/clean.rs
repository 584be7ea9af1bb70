//! The invalidate_cache action kind.

use super::*;

#[cfg(unix)]
#[test]
fn clean_resets_cache() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write(
        "build.hm",
        &format!(
            "{}
target clean
  virtual = true
  invalidate_cache = true
  command = rm -f leaf mid top
",
            CHAIN
        ),
    )?;
    space.write("leaf.txt", "v1")?;
    space.run_expect(&mut hashmake_command(vec!["top"]))?;

    let out = space.run_expect(&mut hashmake_command(vec!["clean"]))?;
    assert_output_contains(&out, "build clean\n");
    assert!(!space.exists("top"));

    let out = space.run_expect(&mut hashmake_command(vec!["top"]))?;
    assert_output_contains(&out, "hashmake: ran 3 tasks, now up to date");
    Ok(())
}

#[cfg(unix)]
#[test]
fn clean_without_removing_files() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write(
        "build.hm",
        &format!(
            "{}
target clean
  virtual = true
  invalidate_cache = true
  command = true
",
            CHAIN
        ),
    )?;
    space.write("leaf.txt", "v1")?;
    space.run_expect(&mut hashmake_command(vec!["top"]))?;
    space.run_expect(&mut hashmake_command(vec!["clean"]))?;

    // Outputs are intact, but the forgotten hashes still force a rebuild.
    let out = space.run_expect(&mut hashmake_command(vec!["top"]))?;
    assert_output_contains(&out, "build leaf\nbuild mid\nbuild top\n");
    Ok(())
}
