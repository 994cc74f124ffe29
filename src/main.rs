use clap::{Arg, ArgAction, ArgMatches, Command};
use std::error::Error;
use std::path::Path;
use std::{fs, io::Write};
use tracing::{debug, info};

use ftplink::logging::init_tracing;
use ftplink::util::{file_name, split_host_port};
use ftplink::{ClientConfig, CommandFuture, DataMode, Session};

///////////////////////
// Utility functions //
///////////////////////

fn build_config(matches: &ArgMatches) -> Result<ClientConfig, Box<dyn Error>> {
	let mut config = match matches.get_one::<String>("config") {
		Some(path) => ClientConfig::load(Path::new(path))?,
		None => ClientConfig::default(),
	};
	config.apply_env()?;

	if let Some(target) = matches.get_one::<String>("host") {
		let (host, port) = split_host_port(target, config.port);
		config.host = host;
		config.port = port;
	}
	if let Some(port) = matches.get_one::<u16>("port") {
		config.port = *port;
	}
	if matches.get_flag("active") {
		config.data_mode = DataMode::Active;
	}
	if matches.get_flag("verbose") {
		config.log_level = "debug".to_string();
	}
	config.validate()?;
	Ok(config)
}

async fn expect_data(future: CommandFuture) -> Result<Vec<u8>, Box<dyn Error>> {
	Ok(future.wait_data().await?)
}

async fn expect_success(future: CommandFuture) -> Result<(), Box<dyn Error>> {
	let label = future.label().to_string();
	if future.wait().await.is_success() {
		Ok(())
	} else {
		Err(format!("{} failed", label).into())
	}
}

fn arg<'a>(matches: &'a ArgMatches, name: &str) -> Result<&'a str, Box<dyn Error>> {
	matches
		.get_one::<String>(name)
		.map(String::as_str)
		.ok_or_else(|| format!("{} argument required", name).into())
}

async fn run(session: &Session, matches: &ArgMatches) -> Result<(), Box<dyn Error>> {
	let mut stdout = std::io::stdout();
	match matches.subcommand() {
		Some(("ls", sub)) => {
			let listing = expect_data(session.list(sub.get_one::<String>("dir").map(String::as_str))?).await?;
			stdout.write_all(&listing)?;
		}
		Some(("nlst", sub)) => {
			let names = expect_data(session.name_list(sub.get_one::<String>("dir").map(String::as_str))?).await?;
			stdout.write_all(&names)?;
		}
		Some(("get", sub)) => {
			let remote = arg(sub, "remote")?;
			let local = sub.get_one::<String>("local").map(String::as_str).unwrap_or_else(|| file_name(remote));
			let data = expect_data(session.retrieve_file(remote)?).await?;
			fs::write(local, &data)?;
			info!("Downloaded {} ({} bytes) to {}", remote, data.len(), local);
		}
		Some(("put", sub)) => {
			let local = arg(sub, "local")?;
			let remote = sub.get_one::<String>("remote").map(String::as_str).unwrap_or_else(|| file_name(local));
			let data = fs::read(local)?;
			let len = data.len();
			let future = if sub.get_flag("append") {
				session.append_file(remote, data)?
			} else {
				session.store_file(remote, data)?
			};
			expect_success(future).await?;
			info!("Uploaded {} ({} bytes) to {}", local, len, session.resolve_path(remote).await);
		}
		Some(("rm", sub)) => expect_success(session.delete_file(arg(sub, "path")?)?).await?,
		Some(("mkdir", sub)) => expect_success(session.make_directory(arg(sub, "dir")?)?).await?,
		Some(("rmdir", sub)) => expect_success(session.remove_directory(arg(sub, "dir")?)?).await?,
		Some(("pwd", _)) => {
			let dir = expect_data(session.working_directory()?).await?;
			writeln!(stdout, "{}", String::from_utf8_lossy(&dir))?;
		}
		Some(("size", sub)) => {
			let size = expect_data(session.file_size(arg(sub, "path")?)?).await?;
			writeln!(stdout, "{}", String::from_utf8_lossy(&size))?;
		}
		Some(("mdtm", sub)) => {
			let time = expect_data(session.modification_time(arg(sub, "path")?)?).await?;
			writeln!(stdout, "{}", String::from_utf8_lossy(&time))?;
		}
		Some(("status", _)) => {
			writeln!(stdout, "{}", serde_json::to_string_pretty(&session.snapshot().await)?)?;
		}
		_ => return Err("unknown subcommand".into()),
	}
	Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
	let matches = Command::new("ftplink")
		.version(env!("CARGO_PKG_VERSION"))
		.about("Command line FTP client")
		.subcommand_required(true)
		.arg(Arg::new("config").short('c').long("config").value_name("FILE").help("Config file (.toml or .json)"))
		.arg(Arg::new("user").short('u').long("user").value_name("USER").default_value("anonymous").help("Login name"))
		.arg(Arg::new("password").short('p').long("password").value_name("PASSWORD").help("Password"))
		.arg(
			Arg::new("port")
				.short('P')
				.long("port")
				.value_name("PORT")
				.value_parser(clap::value_parser!(u16))
				.help("Control port"),
		)
		.arg(Arg::new("active").long("active").action(ArgAction::SetTrue).help("Use active mode (PORT)"))
		.arg(Arg::new("verbose").short('v').long("verbose").action(ArgAction::SetTrue).help("Log protocol traffic"))
		.arg(Arg::new("host").value_name("HOST[:PORT]").help("Server address"))
		.subcommand(Command::new("ls").about("List a directory").arg(Arg::new("dir")))
		.subcommand(Command::new("nlst").about("List file names").arg(Arg::new("dir")))
		.subcommand(
			Command::new("get")
				.about("Download a file")
				.arg(Arg::new("remote").required(true))
				.arg(Arg::new("local")),
		)
		.subcommand(
			Command::new("put")
				.about("Upload a file")
				.arg(Arg::new("local").required(true))
				.arg(Arg::new("remote"))
				.arg(Arg::new("append").long("append").action(ArgAction::SetTrue).help("Append instead of replace")),
		)
		.subcommand(Command::new("rm").about("Delete a file").arg(Arg::new("path").required(true)))
		.subcommand(Command::new("mkdir").about("Create a directory").arg(Arg::new("dir").required(true)))
		.subcommand(Command::new("rmdir").about("Remove a directory").arg(Arg::new("dir").required(true)))
		.subcommand(Command::new("pwd").about("Print the login directory"))
		.subcommand(Command::new("size").about("Print a file's size").arg(Arg::new("path").required(true)))
		.subcommand(Command::new("mdtm").about("Print a file's modification time").arg(Arg::new("path").required(true)))
		.subcommand(Command::new("status").about("Print session state as JSON"))
		.get_matches();

	let config = build_config(&matches)?;
	init_tracing(&config.log_level);
	debug!("Configuration: {:?}", config);

	let user = matches.get_one::<String>("user").map(String::as_str).unwrap_or("anonymous");
	let password = matches.get_one::<String>("password").map(String::as_str);

	let session = Session::new(config);
	let login = session.connect(user, password).await?;
	if !login.wait().await.is_success() {
		session.close().await;
		return Err(format!("login as {} failed", user).into());
	}

	let outcome = run(&session, &matches).await;
	if session.is_connected() {
		if let Ok(quit) = session.quit() {
			quit.wait().await;
		}
	}
	session.close().await;
	outcome
}

// vim: ts=4
