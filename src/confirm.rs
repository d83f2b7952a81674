//! The "this takes hours, are you sure?" prompt shown before a build.

use std::io::{BufRead, Write};

use crate::error::{BuildError, Result};

pub const BANNER: &str = "\
----------------------------------------
               WARNING
----------------------------------------
Building PhantomJS from source takes a very long time, anywhere from 30 minutes
to several hours (depending on the machine configuration). It is recommended to
use the premade binary packages on supported operating systems.
For details, please go the the web site: http://phantomjs.org/download.html.
";

pub const QUESTION: &str = "Do you want to continue (Y/n)? ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Proceed,
    Abort,
    Reprompt,
}

/// Case-insensitive; surrounding whitespace is ignored and an empty answer
/// takes the default.
pub fn parse_answer(answer: &str) -> Decision {
    match answer.trim().to_ascii_lowercase().as_str() {
        "" | "y" => Decision::Proceed,
        "n" => Decision::Abort,
        _ => Decision::Reprompt,
    }
}

/// Show the banner and ask until a valid answer arrives. Returns whether to
/// build. End of input counts as "no".
pub fn confirm_build<R: BufRead, W: Write>(mut input: R, mut output: W) -> Result<bool> {
    let write_err = |e| BuildError::io("writing confirmation prompt", e);

    writeln!(output, "{}", BANNER).map_err(write_err)?;
    loop {
        write!(output, "{}", QUESTION).map_err(write_err)?;
        output.flush().map_err(write_err)?;

        let mut line = String::new();
        let read = input
            .read_line(&mut line)
            .map_err(|e| BuildError::io("reading confirmation answer", e))?;
        if read == 0 {
            writeln!(output).map_err(write_err)?;
            writeln!(output, "Cancelling PhantomJS build.").map_err(write_err)?;
            return Ok(false);
        }

        match parse_answer(&line) {
            Decision::Proceed => return Ok(true),
            Decision::Abort => {
                writeln!(output, "Cancelling PhantomJS build.").map_err(write_err)?;
                return Ok(false);
            }
            Decision::Reprompt => {
                writeln!(output, "Invalid answer, try again.").map_err(write_err)?;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(input: &str) -> (bool, String) {
        let mut output = Vec::new();
        let proceed = confirm_build(input.as_bytes(), &mut output).unwrap();
        (proceed, String::from_utf8(output).unwrap())
    }

    #[test]
    fn test_parse_answer() {
        assert_eq!(parse_answer("y\n"), Decision::Proceed);
        assert_eq!(parse_answer("  Y "), Decision::Proceed);
        assert_eq!(parse_answer("\n"), Decision::Proceed);
        assert_eq!(parse_answer("N"), Decision::Abort);
        assert_eq!(parse_answer("yes"), Decision::Reprompt);
        assert_eq!(parse_answer("maybe"), Decision::Reprompt);
    }

    #[test]
    fn test_empty_answer_proceeds() {
        let (proceed, output) = run("\n");
        assert!(proceed);
        assert!(output.starts_with(BANNER));
        assert!(output.ends_with(QUESTION));
    }

    #[test]
    fn test_reprompts_until_valid() {
        let (proceed, output) = run("what\nsure\nn\n");
        assert!(!proceed);
        assert_eq!(output.matches("Invalid answer, try again.").count(), 2);
        assert_eq!(output.matches(QUESTION).count(), 3);
        assert!(output.ends_with("Cancelling PhantomJS build.\n"));
    }

    #[test]
    fn test_end_of_input_aborts() {
        let (proceed, output) = run("bogus\n");
        assert!(!proceed);
        assert!(output.contains("Cancelling PhantomJS build."));
    }
}
