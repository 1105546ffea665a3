use anyhow::{bail, Context};


/// Settings taken from the command line.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Config {
    /// Stop after this many published cycles; `None` runs until interrupted.
    pub cycles: Option<u64>,
}

/// The first argument after the program name, when given, is the number of
/// cycles to run. Anything after it is ignored.
pub fn parse_config(args: &[String]) -> anyhow::Result<Config> {
    let cycles = match args.get(1) {
        None => None,
        Some(arg) => {
            let n: u64 = arg
                .parse()
                .with_context(|| format!("cycle count `{arg}` is not a number"))?;
            if n == 0 {
                bail!("cycle count must be at least 1");
            }
            Some(n)
        }
    };

    Ok(Config { cycles })
}
