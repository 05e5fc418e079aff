//! Terminal interaction around the enrollment: instructions, reading the
//! link, showing the image, and asking whether to delete it.

use colored::*;
use log::warn;
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::Path;
use std::process::Command;

use crate::errors::EnrollError;

pub fn print_intro() {
    println!("{}", "********** PLEASE READ BELOW BEFORE CONTINUING **********".bold());
    println!("This tool takes a Duo activation link and turns it into a QR code");
    println!("that any HOTP-capable authenticator app can scan.");
    println!("The QR code is written to disk as an image. You will be asked to delete it at the end.");
    println!();
    println!("Open the CruzID MFA settings page and add a new device, then have the");
    println!("activation link emailed to you. When asked, register an Android device.");
    println!();
}

/// Read the enrollment link from one line of input.
pub fn read_enrollment_url<R: BufRead>(reader: &mut R) -> Result<String, EnrollError> {
    let mut line = String::new();
    let n = reader
        .read_line(&mut line)
        .map_err(|e| EnrollError::Input(format!("could not read the link: {}", e)))?;
    if n == 0 {
        return Err(EnrollError::Input(String::from("no link given")));
    }

    let line = line.trim();
    if line.is_empty() {
        return Err(EnrollError::Input(String::from("the link is empty")));
    }
    Ok(line.to_string())
}

/// Ask for the link on stdin.
pub fn prompt_enrollment_url() -> Result<String, EnrollError> {
    print!("URL: ");
    io::stdout().flush()?;
    let stdin = io::stdin();
    let mut lock = stdin.lock();
    read_enrollment_url(&mut lock)
}

fn opener() -> (&'static str, Vec<&'static str>) {
    if cfg!(target_os = "macos") {
        ("open", vec![])
    } else if cfg!(target_os = "windows") {
        ("cmd", vec!["/C", "start", ""])
    } else {
        ("xdg-open", vec![])
    }
}

/// Open `path` with the desktop's default viewer. Not being able to do so
/// is not fatal; the user can open the file by hand.
pub fn open_in_viewer(path: &Path) {
    let (program, args) = opener();
    match Command::new(program).args(&args).arg(path).spawn() {
        Ok(_) => println!("Opening the QR code with your default image viewer..."),
        Err(e) => warn!(
            "could not launch {} ({}), open {} yourself",
            program,
            e,
            path.display()
        ),
    }
}

#[derive(Debug, PartialEq)]
pub enum CleanupChoice {
    Delete,
    Keep,
}

/// An empty answer deletes the image; only an explicit "n" keeps it.
pub fn parse_cleanup_answer(answer: &str) -> CleanupChoice {
    if answer.trim().eq_ignore_ascii_case("n") {
        CleanupChoice::Keep
    } else {
        CleanupChoice::Delete
    }
}

/// Ask whether to delete the image and act on the answer.
pub fn cleanup<R: BufRead>(reader: &mut R, path: &Path) -> Result<CleanupChoice, EnrollError> {
    println!("Scan the QR code with your authenticator app.");
    println!("Afterwards the image should be deleted to protect your account.");
    println!("Close the program showing the image first, then press enter.");
    println!(
        "To keep the image (a {} bad idea unless you protect it), enter \"n\" and press enter.",
        "*really*".red()
    );

    let mut answer = String::new();
    reader
        .read_line(&mut answer)
        .map_err(|e| EnrollError::Input(format!("could not read the answer: {}", e)))?;

    let choice = parse_cleanup_answer(&answer);
    match choice {
        CleanupChoice::Keep => println!(
            "{} {}",
            "Image has not been removed! Please remember to secure it:".yellow(),
            path.display()
        ),
        CleanupChoice::Delete => {
            fs::remove_file(path)?;
            println!("Image has been removed.");
        }
    }
    Ok(choice)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::io::Cursor;

    #[test]
    fn read_url_trims() {
        let mut input = Cursor::new("  https://m-268194b0.duosecurity.com/android/x \r\n");
        assert_eq!(
            read_enrollment_url(&mut input).unwrap(),
            "https://m-268194b0.duosecurity.com/android/x"
        );
    }

    #[test]
    fn read_url_eof() {
        let mut input = Cursor::new("");
        match read_enrollment_url(&mut input) {
            Err(EnrollError::Input(_)) => {}
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn read_url_blank_line() {
        let mut input = Cursor::new("   \n");
        assert!(read_enrollment_url(&mut input).is_err());
    }

    #[test]
    fn cleanup_answers() {
        assert_eq!(parse_cleanup_answer("\n"), CleanupChoice::Delete);
        assert_eq!(parse_cleanup_answer(""), CleanupChoice::Delete);
        assert_eq!(parse_cleanup_answer("y\n"), CleanupChoice::Delete);
        assert_eq!(parse_cleanup_answer(" N \r\n"), CleanupChoice::Keep);
        assert_eq!(parse_cleanup_answer("n"), CleanupChoice::Keep);
    }

    #[test]
    fn cleanup_deletes_on_enter() {
        let path = env::temp_dir().join(format!("otp-enroll-cleanup-{}.png", std::process::id()));
        fs::write(&path, b"png").unwrap();

        let choice = cleanup(&mut Cursor::new("\n"), &path).unwrap();
        assert_eq!(choice, CleanupChoice::Delete);
        assert!(!path.exists());
    }

    #[test]
    fn cleanup_keeps_on_n() {
        let path = env::temp_dir().join(format!("otp-enroll-keep-{}.png", std::process::id()));
        fs::write(&path, b"png").unwrap();

        let choice = cleanup(&mut Cursor::new("n\n"), &path).unwrap();
        assert_eq!(choice, CleanupChoice::Keep);
        assert!(path.exists());
        fs::remove_file(&path).unwrap();
    }
}
