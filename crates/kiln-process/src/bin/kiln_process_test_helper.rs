use std::{
    env,
    io::{self, Write},
    process,
};

fn parse_number<T: std::str::FromStr>(value: Option<String>, flag: &str) -> T {
    let value = value.unwrap_or_else(|| {
        eprintln!("missing value for {flag}");
        process::exit(101);
    });
    value.parse().unwrap_or_else(|_| {
        eprintln!("invalid number for {flag}: {value}");
        process::exit(101);
    })
}

fn write_repeated(mut writer: impl Write, mut bytes: usize, fill: u8) -> io::Result<()> {
    let buf = [fill; 8 * 1024];
    while bytes > 0 {
        let n = bytes.min(buf.len());
        writer.write_all(&buf[..n])?;
        bytes -= n;
    }
    writer.flush()
}

fn main() {
    let mut exit_code = 0;
    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--stdout-bytes" => {
                let bytes = parse_number(args.next(), "--stdout-bytes");
                write_repeated(io::stdout().lock(), bytes, b'a').unwrap();
            }
            "--stderr-bytes" => {
                let bytes = parse_number(args.next(), "--stderr-bytes");
                write_repeated(io::stderr().lock(), bytes, b'b').unwrap();
            }
            "--print-cwd" => {
                let cwd = env::current_dir().unwrap();
                println!("{}", cwd.display());
            }
            "--print-env" => {
                let key: String = args.next().unwrap_or_default();
                println!("{}", env::var(&key).unwrap_or_default());
            }
            "--exit-code" => {
                exit_code = parse_number(args.next(), "--exit-code");
            }
            other => {
                eprintln!("unknown argument: {other}");
                process::exit(101);
            }
        }
    }
    process::exit(exit_code);
}
