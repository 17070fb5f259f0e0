use std::path::{Path, PathBuf};
use std::process::Command;

const ULP_SOURCE: &str = "ulp/pulse_counter.S";

/// Magic of the ESP-IDF ULP binary header: "ulp\0".
const ULP_MAGIC: u32 = 0x0070_6c75;
const ULP_HEADER_LEN: u16 = 12;

fn main() {
    println!("cargo:rerun-if-changed={ULP_SOURCE}");

    // Host builds (tests, simulation) need neither the ESP-IDF environment
    // nor the ULP toolchain.
    if std::env::var("CARGO_CFG_TARGET_OS").as_deref() != Ok("espidf") {
        return;
    }

    embuild::espidf::sysenv::output();

    let out_dir = PathBuf::from(std::env::var("OUT_DIR").unwrap());
    build_ulp_program(Path::new(ULP_SOURCE), &out_dir);
}

/// Assemble the co-processor program and wrap it in the header expected by
/// `ulp_load_binary`.  Data words are declared before the first instruction,
/// so their word offsets start at 0 and match `pulse::layout`.
fn build_ulp_program(source: &Path, out_dir: &Path) {
    let prefix = std::env::var("ULP_TOOLCHAIN_PREFIX").unwrap_or_else(|_| "esp32ulp-elf-".into());

    let object = out_dir.join("pulse_counter.o");
    let elf = out_dir.join("pulse_counter.elf");
    let raw = out_dir.join("pulse_counter.raw");

    run(Command::new(format!("{prefix}as")).arg("-o").arg(&object).arg(source));
    run(Command::new(format!("{prefix}ld"))
        .arg("-Ttext=0")
        .arg("-o")
        .arg(&elf)
        .arg(&object));
    run(Command::new(format!("{prefix}objcopy"))
        .args(["-O", "binary", "-j", ".text"])
        .arg(&elf)
        .arg(&raw));

    let text = std::fs::read(&raw).expect("Failed to read assembled ULP program");
    let text_len = u16::try_from(text.len()).expect("ULP program exceeds RTC slow memory");

    let mut image = Vec::with_capacity(text.len() + ULP_HEADER_LEN as usize);
    image.extend_from_slice(&ULP_MAGIC.to_le_bytes());
    image.extend_from_slice(&ULP_HEADER_LEN.to_le_bytes());
    image.extend_from_slice(&text_len.to_le_bytes());
    image.extend_from_slice(&0u16.to_le_bytes()); // data size
    image.extend_from_slice(&0u16.to_le_bytes()); // bss size
    image.extend_from_slice(&text);

    std::fs::write(out_dir.join("pulse_counter.bin"), image)
        .expect("Failed to write ULP program image");
}

fn run(command: &mut Command) {
    let status = command
        .status()
        .unwrap_or_else(|e| panic!("Failed to start {:?}: {}", command.get_program(), e));
    if !status.success() {
        panic!("{:?} exited with {}", command.get_program(), status);
    }
}
