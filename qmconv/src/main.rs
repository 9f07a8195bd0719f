//! `qmconv` converts a DH file between big- and little-endian on-disk
//! format (`spec.md` §4.11, §6). Also accepts standalone object files
//! carrying inline AK I-type bytecode headers.

use std::path::PathBuf;
use std::process::exit;

use dh::ConvertTarget;

/// Structure storing command line arguments.
#[derive(Default)]
struct Args {
	/// The name of the current program used in command line.
	prog: String,

	/// If true, print command line help.
	help: bool,

	/// If true, print detailed progress information.
	debug: bool,

	/// The requested target endian; `None` converts to this machine's own.
	target: Option<ConvertTarget>,

	/// The DH file directories (or object files) to convert.
	paths: Vec<PathBuf>,
}

fn parse_args() -> Args {
	let mut args: Args = Default::default();
	let mut iter = std::env::args();
	args.prog = iter.next().unwrap_or("qmconv".to_owned());

	while let Some(arg) = iter.next() {
		match arg.as_str() {
			"-B" => args.target = Some(ConvertTarget::Big),
			"-L" => args.target = Some(ConvertTarget::Little),
			"-D" => args.debug = true,
			"-h" | "--help" => args.help = true,

			_ => args.paths.push(arg.into()),
		}
	}

	args
}

fn print_usage(prog: &str) {
	eprintln!("{}: bad usage", prog);
	eprintln!("Try '{} --help' for more information.", prog);
}

fn print_help(prog: &str) {
	println!();
	println!("Usage:");
	println!(" {} [-B|-L] [-D] path...", prog);
	println!();
	println!("Converts DH files between big- and little-endian format.");
	println!("With neither -B nor -L, converts to this machine's own endian.");
	println!();
	println!("Options:");
	println!(" -B           Convert to big-endian format.");
	println!(" -L           Convert to little-endian format.");
	println!(" -D           Print detailed progress information.");
	println!(" -h, --help   Print this help.");
}

fn main() {
	env_logger::init();
	let args = parse_args();

	if args.help {
		print_help(&args.prog);
		exit(0);
	}
	if args.paths.is_empty() {
		print_usage(&args.prog);
		exit(1);
	}

	let target = args.target.unwrap_or(ConvertTarget::Native);
	let mut failures = 0;

	for path in &args.paths {
		if args.debug {
			println!("{}: converting...", path.display());
		}
		match dh::convert_file(path, target) {
			Ok(()) => {
				if args.debug {
					println!("{}: done", path.display());
				}
			}
			Err(e) => {
				eprintln!("{}: {}: {}", args.prog, path.display(), e);
				failures += 1;
			}
		}
	}

	if failures > 0 {
		exit(1);
	}
}
