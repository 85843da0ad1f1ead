//! Subcommand implementations

pub mod info;
pub mod scenario;
pub mod stress;

use garnet_core::Runtime;

/// Print cache and heap counters
pub fn print_stats(runtime: &Runtime) {
    let cache = runtime.cache_stats();
    let gc = runtime.gc_stats();
    let heap = runtime.heap_stats();

    println!();
    println!("Method cache:");
    println!("  capacity        {}", runtime.cache().capacity());
    println!("  hits            {}", cache.hits);
    println!("  misses          {}", cache.misses);
    println!("  stores          {}", cache.stores);
    println!("  rejected stores {}", cache.rejected_stores);
    println!("  invalidations   {}", cache.invalidations);
    println!("GC:");
    println!("  collections     {}", gc.collections);
    println!("  objects freed   {}", gc.objects_freed);
    println!("  scopes freed    {}", gc.scopes_freed);
    println!("  scopes moved    {}", gc.scopes_relocated);
    println!("  total pause     {:?}", gc.total_pause_time);
    println!("Heap:");
    println!("  live objects    {}", heap.live_objects);
    println!("  live scopes     {}", heap.live_scopes);
}
