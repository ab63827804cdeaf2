use crate::e2e::*;

#[test]
fn no_default() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write("Makefile.fringe", "# nothing here\n")?;
    let out = space.run_fail(&mut fringe_command(vec![]))?;
    assert_output_contains(&out, "no target specified and no default");
    Ok(())
}

#[test]
fn basic_build() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write("Makefile.fringe", &format!("out: in\n\t{} out\n", TOUCH))?;
    space.write("in", "")?;
    let out = space.run_expect(&mut fringe_command(vec!["out"]))?;
    assert!(space.exists("out"));
    assert_output_contains(&out, "ran 1 tasks, now up to date");

    let out = space.run_expect(&mut fringe_command(vec!["out"]))?;
    assert_output_contains(&out, "`out' is up to date.");
    assert_output_contains(&out, "no work to do");
    Ok(())
}

#[test]
fn default_is_first_target() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write(
        "Makefile.fringe",
        &format!("first: in\n\t{t} first\nsecond: in\n\t{t} second\n", t = TOUCH),
    )?;
    space.write("in", "")?;
    space.run_expect(&mut fringe_command(vec![]))?;
    assert!(space.exists("first"));
    assert!(!space.exists("second"));
    Ok(())
}

#[test]
fn other_file_and_dir() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    std::fs::create_dir(space.path("sub"))?;
    space.write("sub/rules", &format!("out:\n\t{} out\n", TOUCH))?;
    space.run_expect(&mut fringe_command(vec!["-C", "sub", "-f", "rules"]))?;
    assert!(space.exists("sub/out"));
    Ok(())
}

#[test]
fn newer_input_rebuilds() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write(
        "Makefile.fringe",
        &format!("out: mid\n\t{t} out\nmid: in\n\t{t} mid\n", t = TOUCH),
    )?;
    space.write("in", "")?;
    space.run_expect(&mut fringe_command(vec!["out"]))?;

    // Make everything old, then the source newer than its output.
    space.age("out", 2000)?;
    space.age("mid", 1000)?;
    space.age("in", 1500)?;
    let out = space.run_expect(&mut fringe_command(vec!["out"]))?;
    assert_output_contains(&out, "ran 2 tasks");

    space.age("mid", 500)?;
    space.age("in", 100)?;
    let out = space.run_expect(&mut fringe_command(vec!["out"]))?;
    assert_output_contains(&out, "no work to do");
    Ok(())
}

#[cfg(unix)]
#[test]
fn exec_only_child_does_not_cascade() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write(
        "Makefile.fringe",
        "
out: gen
\techo built >> log
\ttouch out
gen: .EXEC
\t@true
",
    )?;
    space.run_expect(&mut fringe_command(vec!["out"]))?;
    let out = space.run_expect(&mut fringe_command(vec!["out"]))?;
    assert_output_contains(&out, "`out' is up to date.");
    assert_eq!(space.read("log")?, b"built\n");
    Ok(())
}

#[test]
fn dry_run() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write("Makefile.fringe", &format!("out: mid\n\t{t} out\nmid:\n\t{t} mid\n", t = TOUCH))?;
    let out = space.run_expect(&mut fringe_command(vec!["-n", "out"]))?;
    assert_output_contains(&out, &format!("{} mid", TOUCH));
    assert_output_contains(&out, &format!("{} out", TOUCH));
    assert!(!space.exists("mid"));
    assert!(!space.exists("out"));
    Ok(())
}

#[test]
fn query() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write("Makefile.fringe", &format!("out: in\n\t{} out\n", TOUCH))?;
    space.write("in", "")?;
    let out = space.run(&mut fringe_command(vec!["-q", "out"]))?;
    assert_eq!(out.status.code(), Some(1));
    assert!(!space.exists("out"));

    space.run_expect(&mut fringe_command(vec!["out"]))?;
    let out = space.run(&mut fringe_command(vec!["-q", "out"]))?;
    assert_eq!(out.status.code(), Some(0));
    Ok(())
}

#[cfg(unix)]
#[test]
fn use_only_commands() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write(
        "Makefile.fringe",
        "
prog: in stamp
\techo prog >> log
stamp: .USE
\t@echo stamp >> log
\ttouch prog
",
    )?;
    space.write("in", "")?;
    let out = space.run_expect(&mut fringe_command(vec!["prog"]))?;
    assert_output_contains(&out, "echo prog >> log");
    assert_output_not_contains(&out, "echo stamp");
    assert_eq!(space.read("log")?, b"prog\nstamp\n");
    assert!(space.exists("prog"));
    assert!(!space.exists("stamp"));
    Ok(())
}

#[test]
fn verbose() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write("Makefile.fringe", &format!("out:\n\t@{} out\n", TOUCH))?;
    let out = space.run_expect(&mut fringe_command(vec!["-v", "out"]))?;
    assert_output_contains(&out, "making out");
    assert_output_not_contains(&out, &format!("{} out", TOUCH));
    Ok(())
}

#[test]
fn debug_tools() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write("Makefile.fringe", "out:\n")?;
    let out = space.run(&mut fringe_command(vec!["-d", "list"]))?;
    assert_output_contains(&out, "debug tools:");

    let out = space.run_fail(&mut fringe_command(vec!["-d", "bogus"]))?;
    assert_output_contains(&out, "unknown -d");

    space.write("out", "")?;
    space.run_expect(&mut fringe_command(vec!["-d", "trace", "out"]))?;
    let trace = String::from_utf8(space.read("trace.json")?)?;
    assert!(trace.starts_with('['));
    assert!(trace.trim_end().ends_with(']'));
    Ok(())
}

#[test]
fn bad_rule_file() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write("Makefile.fringe", "out: .SOMETIMES\n")?;
    let out = space.run_fail(&mut fringe_command(vec![]))?;
    assert_output_contains(&out, "Makefile.fringe:1: unknown attribute .SOMETIMES");
    Ok(())
}
