//! `garnet info`: Display the default runtime configuration.

use garnet_core::VmOptions;

pub fn execute() -> anyhow::Result<bool> {
    let options = VmOptions::default();
    println!("Garnet v{}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("Platform:       {} ({})", std::env::consts::OS, std::env::consts::ARCH);
    println!("Cache capacity: {}", options.cache.capacity);
    println!("Invalidation:   {:?}", options.cache.invalidation);
    println!("GC threshold:   {}", options.gc.threshold);
    println!("GC compaction:  {}", options.gc.compact);
    println!("Max call depth: {}", options.max_call_depth);
    Ok(true)
}
