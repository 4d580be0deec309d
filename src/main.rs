//! Sprout Builder CLI
//!
//! Builds a minimal bootable Linux system: a compiled kernel, a BusyBox
//! userspace staged around an externally built init binary, and a raw ext4
//! disk image to boot it from.
//!
//! # Usage
//!
//! ```bash
//! # Show current status
//! sprout status
//!
//! # Verify host prerequisites
//! sprout check
//!
//! # Full build: deps -> kernel -> init -> busybox -> rootfs
//! sprout build
//!
//! # Rebuild a single stage
//! sprout build kernel --clean
//!
//! # Provision the disk image from the staged rootfs
//! sprout image
//!
//! # Boot in QEMU, or verify the boot headless
//! sprout run
//! sprout test --timeout 300
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use sprout::arch::Arch;
use sprout::config::{self, Paths};

#[derive(Parser)]
#[command(name = "sprout")]
#[command(author, version, about = "Minimal bootable Linux system builder", long_about = None)]
struct Cli {
    /// Base directory for downloads/, work/, and output/
    #[arg(short = 'C', long = "dir", global = true, default_value = ".")]
    dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the system (full pipeline, or a single stage)
    Build {
        #[command(subcommand)]
        stage: Option<BuildStage>,

        /// Skip host package installation
        #[arg(long)]
        skip_deps: bool,
    },

    /// Provision a raw ext4 disk image from the staged rootfs
    Image {
        /// Image size, in qemu-img syntax (e.g. 512M, 2G)
        #[arg(long, default_value = config::DEFAULT_IMAGE_SIZE)]
        size: String,
    },

    /// Install host build dependencies via the system package manager
    Deps,

    /// Run preflight checks (tools, disk space, network, cache)
    Check,

    /// Run the built system in QEMU (interactive serial console)
    Run,

    /// Test the system boots correctly (headless, automated)
    Test {
        /// Timeout in seconds (default: 300)
        #[arg(short, long, default_value = "300")]
        timeout: u64,
    },

    /// Show build status and next steps
    Status,
}

#[derive(Subcommand)]
enum BuildStage {
    /// Download and build the kernel from source
    Kernel {
        /// Wipe the kernel tree config and rebuild from scratch
        #[arg(long)]
        clean: bool,
    },
    /// Download and build the BusyBox install tree
    Busybox,
    /// Clone (or update) and build the init project
    Init,
    /// Stage the root filesystem from BusyBox and the init binary
    Rootfs,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let paths = Paths::new(&cli.dir);

    let result = match cli.command {
        Commands::Build { stage, skip_deps } => match stage {
            Some(BuildStage::Kernel { clean }) => cmd_build_kernel(&paths, clean),
            Some(BuildStage::Busybox) => cmd_build_busybox(&paths),
            Some(BuildStage::Init) => cmd_build_init(&paths),
            Some(BuildStage::Rootfs) => cmd_build_rootfs(&paths),
            None => cmd_build(&paths, skip_deps),
        },
        Commands::Image { size } => cmd_image(&paths, &size),
        Commands::Deps => cmd_deps(),
        Commands::Check => cmd_check(&paths).await,
        Commands::Run => cmd_run(&paths),
        Commands::Test { timeout } => cmd_test(&paths, timeout),
        Commands::Status => cmd_status(&paths),
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn cmd_build(paths: &Paths, skip_deps: bool) -> Result<()> {
    use sprout::Timer;
    use std::time::Instant;

    // Full build: host deps + kernel + init + busybox + rootfs.
    // Each stage skips itself when its output already exists.
    let build_start = Instant::now();

    println!("=== Full Sprout Build ===\n");

    let arch = Arch::detect()?;
    println!("Architecture: {} (cross prefix: {})", arch, arch.cross_compile());
    println!();

    // 1. Host packages
    if skip_deps {
        println!("[SKIP] Host dependencies (--skip-deps)");
    } else {
        sprout::deps::install_dependencies()?;
    }

    // 2. Kernel
    println!();
    let t = Timer::start("Kernel");
    sprout::build::kernel::build(paths, arch, false)?;
    t.finish();

    // 3. Init binary (external project)
    println!();
    let t = Timer::start("Init");
    sprout::build::init::build(paths)?;
    t.finish();

    // 4. BusyBox userspace
    println!();
    let t = Timer::start("BusyBox");
    sprout::build::busybox::build(paths, arch)?;
    t.finish();

    // 5. Root filesystem
    println!();
    let t = Timer::start("Rootfs");
    sprout::artifact::stage_rootfs(paths)?;
    t.finish();

    let total = build_start.elapsed().as_secs_f64();
    if total >= 60.0 {
        println!("\n=== Build Complete ({:.1}m) ===", total / 60.0);
    } else {
        println!("\n=== Build Complete ({:.1}s) ===", total);
    }
    println!("  Kernel: {}", paths.kernel_image(arch).display());
    println!("  Rootfs: {}", paths.rootfs.display());
    println!("\nNext: sprout image");

    Ok(())
}

fn cmd_build_kernel(paths: &Paths, clean: bool) -> Result<()> {
    use sprout::Timer;

    let arch = Arch::detect()?;
    let t = Timer::start("Kernel");
    let image = sprout::build::kernel::build(paths, arch, clean)?;
    t.finish();

    println!("\n=== Kernel build complete ===");
    println!("  Image: {}", image.display());
    Ok(())
}

fn cmd_build_busybox(paths: &Paths) -> Result<()> {
    use sprout::Timer;

    let arch = Arch::detect()?;
    let t = Timer::start("BusyBox");
    sprout::build::busybox::build(paths, arch)?;
    t.finish();
    Ok(())
}

fn cmd_build_init(paths: &Paths) -> Result<()> {
    use sprout::Timer;

    let t = Timer::start("Init");
    sprout::build::init::build(paths)?;
    t.finish();
    Ok(())
}

fn cmd_build_rootfs(paths: &Paths) -> Result<()> {
    use sprout::Timer;

    let t = Timer::start("Rootfs");
    sprout::artifact::stage_rootfs(paths)?;
    t.finish();
    Ok(())
}

fn cmd_image(paths: &Paths, size: &str) -> Result<()> {
    use sprout::Timer;

    let t = Timer::start("Image");
    sprout::artifact::provision_image(paths, size)?;
    t.finish();

    println!("\nNext: sprout run");
    Ok(())
}

fn cmd_deps() -> Result<()> {
    sprout::deps::install_dependencies()
}

async fn cmd_check(paths: &Paths) -> Result<()> {
    let report = sprout::preflight::run_checks(paths).await;
    report.print_summary();

    if !report.is_ok() {
        anyhow::bail!("preflight found problems; fix the failures above and rerun");
    }
    Ok(())
}

fn cmd_run(paths: &Paths) -> Result<()> {
    let arch = Arch::detect()?;
    sprout::qemu::run(paths, arch)
}

fn cmd_test(paths: &Paths, timeout: u64) -> Result<()> {
    let arch = Arch::detect()?;
    sprout::qemu::test_boot(paths, arch, timeout)
}

fn cmd_status(paths: &Paths) -> Result<()> {
    println!("Sprout Builder Status");
    println!("=====================");
    println!();

    println!("Configuration:");
    let arch = Arch::detect().ok();
    match arch {
        Some(a) => {
            println!("  Architecture:    {} (cross prefix: {})", a, a.cross_compile());
        }
        None => println!("  Architecture:    NOT DETECTED (uname -m failed)"),
    }
    println!("  Kernel:          linux {}", config::KERNEL_VERSION);
    println!("  BusyBox:         {}", config::BUSYBOX_VERSION);
    println!("  Init repo:       {}", config::INIT_REPO_URL);
    println!();

    println!("Sources:");
    if paths.kernel_tarball.exists() {
        println!("  Kernel tarball:  FOUND at {}", paths.kernel_tarball.display());
    } else {
        println!("  Kernel tarball:  NOT FOUND (run 'sprout build kernel')");
    }
    if paths.kernel_src.join("Makefile").exists() {
        println!("  Kernel source:   FOUND at {}", paths.kernel_src.display());
    } else {
        println!("  Kernel source:   NOT FOUND (run 'sprout build kernel')");
    }
    if paths.busybox_tarball.exists() {
        println!("  BusyBox tarball: FOUND at {}", paths.busybox_tarball.display());
    } else {
        println!("  BusyBox tarball: NOT FOUND (run 'sprout build busybox')");
    }
    if paths.init_src.join(".git").exists() {
        println!("  Init checkout:   FOUND at {}", paths.init_src.display());
    } else {
        println!("  Init checkout:   NOT FOUND (run 'sprout build init')");
    }
    println!();

    // The kernel image path depends on the build arch; when detection
    // fails, report whichever arch image is present.
    let kernel_image = arch
        .map(|a| paths.kernel_image(a))
        .filter(|p| p.exists())
        .or_else(|| {
            [Arch::X86_64, Arch::Arm64]
                .into_iter()
                .map(|a| paths.kernel_image(a))
                .find(|p| p.exists())
        });
    let busybox = paths.busybox_install().join("bin/busybox");
    let init_binary = paths.init_binary();
    let rootfs_init = paths.rootfs.join("init");

    println!("Build Artifacts:");
    match &kernel_image {
        Some(p) => {
            let size = std::fs::metadata(p).map(|m| m.len() / 1024 / 1024).unwrap_or(0);
            println!("  Kernel image:    BUILT ({} MB)", size);
        }
        None => println!("  Kernel image:    NOT BUILT"),
    }
    if busybox.exists() {
        println!("  BusyBox install: BUILT at {}", paths.busybox_install().display());
    } else {
        println!("  BusyBox install: NOT BUILT");
    }
    if init_binary.exists() {
        println!("  Init binary:     BUILT at {}", init_binary.display());
    } else {
        println!("  Init binary:     NOT BUILT");
    }
    if rootfs_init.exists() {
        println!("  Rootfs:          STAGED at {}", paths.rootfs.display());
    } else {
        println!("  Rootfs:          NOT STAGED");
    }
    if paths.disk_image.exists() {
        let size = std::fs::metadata(&paths.disk_image)
            .map(|m| m.len() / 1024 / 1024)
            .unwrap_or(0);
        println!("  Disk image:      BUILT ({} MB)", size);
    } else {
        println!("  Disk image:      NOT BUILT");
    }
    println!();

    println!("Next steps:");
    if kernel_image.is_none() {
        println!("  1. Run 'sprout build' to build everything");
    } else if !init_binary.exists() {
        println!("  1. Run 'sprout build init' to build the init binary");
    } else if !busybox.exists() {
        println!("  1. Run 'sprout build busybox' to build the userspace");
    } else if !rootfs_init.exists() {
        println!("  1. Run 'sprout build rootfs' to stage the root filesystem");
    } else if !paths.disk_image.exists() {
        println!("  1. Run 'sprout image' to provision the disk image");
    } else {
        println!("  System ready! Run 'sprout run' to boot in QEMU.");
    }

    Ok(())
}
