//! `qmidx` relocates, deletes, or reports the index-subfile directory of a
//! DH file (`spec.md` §6; Supplemented feature #7, grounded on
//! `qmidx.c`'s four modes).

use std::path::PathBuf;
use std::process::exit;

use dh::IndexReport;

/// Which of `qmidx`'s four modes was requested.
#[derive(Default, Clone, Copy, PartialEq, Eq)]
enum Mode {
	#[default]
	Query,
	Delete,
	Move,
	SetPath,
}

/// Structure storing command line arguments.
struct Args {
	/// The name of the current program used in command line.
	prog: String,

	mode: Mode,

	/// If true, print command line help.
	help: bool,

	/// Path to the DH file's directory.
	data_path: Option<PathBuf>,

	/// Target index directory for `-m`/`-p`; empty string means "back to
	/// the file's own directory".
	ak_path: Option<String>,
}

impl Default for Args {
	fn default() -> Self {
		Self { prog: String::new(), mode: Mode::default(), help: false, data_path: None, ak_path: None }
	}
}

fn parse_args() -> Args {
	let mut args = Args::default();
	let mut iter = std::env::args();
	args.prog = iter.next().unwrap_or("qmidx".to_owned());

	let mut mode_set = false;
	let mut positionals = Vec::new();

	for arg in iter {
		match arg.as_str() {
			"-d" | "-D" if !mode_set => {
				args.mode = Mode::Delete;
				mode_set = true;
			}
			"-m" | "-M" if !mode_set => {
				args.mode = Mode::Move;
				mode_set = true;
			}
			"-p" | "-P" if !mode_set => {
				args.mode = Mode::SetPath;
				mode_set = true;
			}
			"-q" | "-Q" if !mode_set => {
				args.mode = Mode::Query;
				mode_set = true;
			}
			"-h" | "--help" => args.help = true,
			_ => positionals.push(arg),
		}
	}

	let mut it = positionals.into_iter();
	args.data_path = it.next().map(PathBuf::from);
	args.ak_path = it.next();
	if it.next().is_some() {
		// Unexpected extra argument; leave data_path/ak_path as-is and
		// let main's validation reject it via the leftover below.
		args.data_path = None;
	}

	args
}

fn print_usage(prog: &str) {
	eprintln!("{} -d datapath           Delete indices", prog);
	eprintln!("{} -m datapath {{akpath}}  Move indices to new location", prog);
	eprintln!("{} -p datapath {{akpath}}  Set index path", prog);
	eprintln!("{} -q datapath           Report path", prog);
	eprintln!("{} datapath              Report path", prog);
}

fn main() {
	env_logger::init();
	let args = parse_args();

	if args.help {
		print_usage(&args.prog);
		exit(0);
	}

	let Some(data_path) = args.data_path else {
		print_usage(&args.prog);
		exit(1);
	};

	let result = match args.mode {
		Mode::Delete => dh::idx::delete_indices(&data_path).map(|()| {
			println!("All indices deleted");
		}),
		Mode::Move => {
			let ak_path = args.ak_path.unwrap_or_default();
			dh::idx::move_indices(&data_path, &ak_path).map(|()| {
				println!("Indices have been moved");
			})
		}
		Mode::SetPath => {
			let ak_path = args.ak_path.unwrap_or_default();
			dh::idx::set_index_path(&data_path, &ak_path).map(|()| {
				println!("Index path updated");
			})
		}
		Mode::Query => dh::idx::query_path(&data_path).map(|report| match report {
			IndexReport::NoIndices => println!("File has no indices"),
			IndexReport::NotRelocated => println!("Indices are not relocated"),
			IndexReport::RelocatedTo(p) => println!("Index directory is {}", p),
		}),
	};

	if let Err(e) = result {
		eprintln!("{}: {}", args.prog, e);
		exit(1);
	}
}
