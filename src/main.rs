use adler::Adler32;
use anyhow::Result;
use std::collections::HashMap;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;
use xp3_tool::Xp3Archive;
use xp3_tool::args::{self, Command};
use xp3_tool::utils::files::{make_sure_dir_exists, sanitize_entry_path};

fn open_archive(path: &str) -> Result<Xp3Archive<std::fs::File>> {
    Xp3Archive::open(path).map_err(|e| anyhow::anyhow!("Failed to read index from {}: {}", path, e))
}

fn cmd_ls(path: &str) -> Result<()> {
    let archive = open_archive(path)?;
    let mut seg_counter: HashMap<u64, u64> = HashMap::new();
    for file in archive.files() {
        for seg in &file.segments {
            *seg_counter.entry(seg.start).or_insert(0) += 1;
        }
    }
    for file in archive.files() {
        println!(
            "{} (original size: {}, packed size: {}, segments: {})",
            file.filename,
            file.original_size,
            file.packed_size,
            file.segments.len()
        );
        for seg in &file.segments {
            println!(
                "  Segment: start={}, original_size={}, packed_size={}, flag=0x{:X}, count={}",
                seg.start, seg.original_size, seg.packed_size, seg.flag, seg_counter[&seg.start]
            );
        }
    }
    Ok(())
}

fn extract_file(
    archive: &Xp3Archive<std::fs::File>,
    index: usize,
    filename: &Path,
) -> Result<u64> {
    let mut file = archive.open_file(index)?;
    make_sure_dir_exists(filename)?;
    let mut out = std::fs::File::create(filename)?;
    let mut buffer = [0u8; 8192];
    let mut total_written = 0u64;
    loop {
        let readed = file.read(&mut buffer)?;
        if readed == 0 {
            break;
        }
        out.write_all(&buffer[..readed])?;
        total_written += readed as u64;
    }
    Ok(total_written)
}

fn cmd_extract(path: &str, output: &Option<String>) -> Result<()> {
    let archive = open_archive(path)?;
    let out_dir = match output {
        Some(output) => PathBuf::from(output),
        None => Path::new(path)
            .file_stem()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("xp3")),
    };
    for (index, entry) in archive.files().iter().enumerate() {
        print!("Extracting {} ... ", entry.filename);
        let _ = std::io::stdout().flush();
        let filename = out_dir.join(sanitize_entry_path(&entry.filename));
        match extract_file(&archive, index, &filename) {
            Ok(total_written) => {
                if total_written != entry.original_size {
                    println!(
                        "Warning: extracted size ({}) does not match original size ({})",
                        total_written, entry.original_size
                    );
                } else {
                    println!("Done ({} bytes)", total_written);
                }
            }
            Err(e) => {
                println!("Failed to extract {}: {}", entry.filename, e);
            }
        }
    }
    Ok(())
}

fn cmd_speedtest(path: &str) -> Result<()> {
    let archive = open_archive(path)?;
    let start = Instant::now();
    let mut total = 0u64;
    let mut buffer = [0u8; 8192];
    for (index, entry) in archive.files().iter().enumerate() {
        let mut file = match archive.open_file(index) {
            Ok(file) => file,
            Err(e) => {
                println!("Failed to open {}: {}", entry.filename, e);
                continue;
            }
        };
        loop {
            match file.read(&mut buffer) {
                Ok(0) => break,
                Ok(readed) => total += readed as u64,
                Err(e) => {
                    println!("Failed to read {}: {}", entry.filename, e);
                    break;
                }
            }
        }
    }
    let seconds = start.elapsed().as_secs_f64().max(1e-9);
    println!(
        "Read {} bytes in {:.3} seconds ({:.2} MB/s)",
        total,
        seconds,
        total as f64 / seconds / (1024.0 * 1024.0)
    );
    Ok(())
}

fn cmd_verify(path: &str) -> Result<()> {
    let archive = open_archive(path)?;
    let mut ok = 0u64;
    let mut failed = 0u64;
    let mut skipped = 0u64;
    for (index, entry) in archive.files().iter().enumerate() {
        if entry.adler32 == 0 {
            skipped += 1;
            continue;
        }
        let checksum = archive.open_file(index).and_then(|mut file| {
            let mut adler = Adler32::new();
            let mut buffer = [0u8; 8192];
            loop {
                let readed = file.read(&mut buffer)?;
                if readed == 0 {
                    break;
                }
                adler.write_slice(&buffer[..readed]);
            }
            Ok(adler.checksum())
        });
        match checksum {
            Ok(checksum) if checksum == entry.adler32 => ok += 1,
            Ok(checksum) => {
                println!(
                    "{}: Adler-32 mismatch (stored {:08x}, computed {:08x})",
                    entry.filename, entry.adler32, checksum
                );
                failed += 1;
            }
            Err(e) => {
                println!("{}: Failed to read: {}", entry.filename, e);
                failed += 1;
            }
        }
    }
    println!(
        "Verified {} files: {} OK, {} failed, {} skipped",
        archive.files().len(),
        ok,
        failed,
        skipped
    );
    Ok(())
}

fn run(arg: &args::Arg) -> Result<()> {
    match &arg.command {
        Command::Ls { archive } => cmd_ls(archive),
        Command::Extract { archive, output } => cmd_extract(archive, output),
        Command::Speedtest { archive } => cmd_speedtest(archive),
        Command::Verify { archive } => cmd_verify(archive),
    }
}

fn main() {
    let arg = args::parse_args();
    if arg.backtrace {
        unsafe { std::env::set_var("RUST_LIB_BACKTRACE", "1") };
    }
    if let Err(e) = run(&arg) {
        println!("{}", e);
        if arg.backtrace {
            println!("Backtrace: {:?}", e.backtrace());
        }
        std::process::exit(1);
    }
}
