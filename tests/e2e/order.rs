use crate::e2e::*;

#[cfg(unix)]
#[test]
fn order_holds_under_parallelism() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write(
        "Makefile.fringe",
        "
all: a b c
\t@true
.ORDER: a b
a:
\t@sleep 0.2
\t@echo a >> log
b:
\t@echo b >> log
c:
\t@echo c >> log
",
    )?;
    for seed in 0..4 {
        let _ = std::fs::remove_file(space.path("log"));
        let seed = seed.to_string();
        space.run_expect(&mut fringe_command(vec!["-j", "4", "-r", "--seed", &seed]))?;
        let log = String::from_utf8(space.read("log")?)?;
        let a = log.find('a').expect("a ran");
        let b = log.find('b').expect("b ran");
        assert!(a < b, "seed {}: {:?}", seed, log);
        assert!(log.contains('c'));
    }
    Ok(())
}

#[cfg(unix)]
#[test]
fn seed_replays_order() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    let names: Vec<String> = (0..8).map(|i| format!("n{}", i)).collect();
    let mut text = format!("all: {}\n\t@true\n", names.join(" "));
    for name in &names {
        text.push_str(&format!("{}:\n\t@echo {} >> log\n", name, name));
    }
    space.write("Makefile.fringe", &text)?;

    let mut logs = Vec::new();
    for _ in 0..2 {
        let _ = std::fs::remove_file(space.path("log"));
        space.run_expect(&mut fringe_command(vec!["-j", "1", "-r", "--seed", "7"]))?;
        logs.push(String::from_utf8(space.read("log")?)?);
    }
    assert_eq!(logs[0], logs[1]);
    let mut ran: Vec<&str> = logs[0].lines().collect();
    ran.sort_unstable();
    assert_eq!(ran, names);
    Ok(())
}

#[cfg(unix)]
#[test]
fn random_order_from_environment() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write("Makefile.fringe", "all: x y\nx:\n\t@true\ny:\n\t@true\n")?;
    let out = space.run_expect(
        fringe_command(vec!["all"])
            .env("RANDOM_ORDER", "1")
            .env("FRINGE_LOG", "info"),
    )?;
    let stderr = String::from_utf8(out.stderr)?;
    assert!(stderr.contains("randomizing build order"), "{}", stderr);
    Ok(())
}
