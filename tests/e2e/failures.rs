use crate::e2e::*;

#[cfg(unix)]
#[test]
fn failed_command() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write("Makefile.fringe", "out:\n\techo oops\n\tfalse\n\ttouch out\n")?;
    let out = space.run_fail(&mut fringe_command(vec!["out"]))?;
    assert_output_contains(&out, "oops");
    assert_output_contains(&out, "exit 1");
    assert_output_contains(&out, "*** failed: out");
    assert_output_contains(&out, "`out' not remade because of errors.");
    assert!(!space.exists("out"));
    Ok(())
}

#[cfg(unix)]
#[test]
fn ignored_failure() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write("Makefile.fringe", "out:\n\t-false\n\ttouch out\n")?;
    let out = space.run_expect(&mut fringe_command(vec!["out"]))?;
    assert_output_contains(&out, "exit 1 (ignored)");
    assert!(space.exists("out"));
    Ok(())
}

#[test]
fn missing_source() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write("Makefile.fringe", &format!("out: in\n\t{} out\n", TOUCH))?;
    let out = space.run_fail(&mut fringe_command(vec!["out"]))?;
    assert_output_contains(&out, "don't know how to make in");
    assert!(!space.exists("out"));
    Ok(())
}

#[test]
fn unknown_target() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write("Makefile.fringe", "out:\n")?;
    let out = space.run_fail(&mut fringe_command(vec!["nope"]))?;
    assert_output_contains(&out, "don't know how to make \"nope\"");
    Ok(())
}

#[cfg(unix)]
#[test]
fn stop_after_first_failure() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write(
        "Makefile.fringe",
        "
all: bad good
bad:
\tfalse
good:
\ttouch good
",
    )?;
    space.run_fail(&mut fringe_command(vec!["-j", "1", "all"]))?;
    assert!(!space.exists("good"));
    Ok(())
}

#[cfg(unix)]
#[test]
fn keep_going() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write(
        "Makefile.fringe",
        "
all: mid good
mid: bad
\ttouch mid
bad:
\tfalse
good:
\ttouch good
",
    )?;
    let out = space.run_fail(&mut fringe_command(vec!["-k", "0", "-j", "1", "all"]))?;
    assert!(space.exists("good"));
    assert!(!space.exists("mid"));
    assert_output_contains(&out, "`all' not remade because of errors.");
    Ok(())
}

#[test]
fn cycle() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write("Makefile.fringe", "a: b\nb: a\n")?;
    let out = space.run_fail(&mut fringe_command(vec!["a"]))?;
    assert_output_contains(&out, "dependency cycle: a -> b -> a");
    Ok(())
}

#[test]
fn self_dependency() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write("Makefile.fringe", "a: a\n")?;
    let out = space.run_fail(&mut fringe_command(vec![]))?;
    assert_output_contains(&out, "a depends on itself");
    Ok(())
}
