//! Command-line parsing

use anyhow::{Result, bail};

/// Parsed invocation.
#[derive(Debug, PartialEq, Eq)]
pub struct Invocation {
    pub config_path: Option<String>,
    pub command: Command,
}

#[derive(Debug, PartialEq, Eq)]
pub enum Command {
    Login {
        username: String,
        password: String,
    },
    Register {
        first_name: String,
        last_name: String,
        email: String,
        password: String,
        address: String,
    },
    ForgotPassword {
        email: String,
    },
    Logout,
    Status,
    Get {
        path: String,
    },
}

pub const USAGE: &str = "usage: dispatch-client [--config PATH] <command>

commands:
  login <username> <password>
  register <first> <last> <email> <password> <address>
  forgot-password <email>
  logout
  status
  get <path>";

/// Parse arguments, excluding the program name.
pub fn parse<I, S>(args: I) -> Result<Invocation>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut config_path = None;
    let mut positional = Vec::new();

    let mut args = args.into_iter().map(Into::into);
    while let Some(arg) = args.next() {
        if arg == "--config" {
            match args.next() {
                Some(path) => config_path = Some(path),
                None => bail!("--config requires a path"),
            }
        } else {
            positional.push(arg);
        }
    }

    let Some((name, rest)) = positional.split_first() else {
        bail!("missing command\n\n{USAGE}");
    };

    let command = match (name.as_str(), rest) {
        ("login", [username, password]) => Command::Login {
            username: username.clone(),
            password: password.clone(),
        },
        ("register", [first, last, email, password, address]) => Command::Register {
            first_name: first.clone(),
            last_name: last.clone(),
            email: email.clone(),
            password: password.clone(),
            address: address.clone(),
        },
        ("forgot-password", [email]) => Command::ForgotPassword {
            email: email.clone(),
        },
        ("logout", []) => Command::Logout,
        ("status", []) => Command::Status,
        ("get", [path]) => Command::Get { path: path.clone() },
        ("login" | "register" | "forgot-password" | "logout" | "status" | "get", _) => {
            bail!("wrong number of arguments for `{name}`\n\n{USAGE}")
        }
        _ => bail!("unknown command `{name}`\n\n{USAGE}"),
    };

    Ok(Invocation {
        config_path,
        command,
    })
}
