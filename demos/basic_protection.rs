use vmprotect::protect;
use vmprotect::protector::{environment, markers, ProtectedRegion, RegionKind};

fn main() -> vmprotect::Result<()> {
    env_logger::init();

    // 1. Look at the environment before doing anything sensitive
    let report = environment::report();
    println!("protected build: {}", report.protected);

    if report.is_hostile() {
        println!("Warning: hostile environment ({:?})", report);
    }

    // 2. Mark the code the protection tool should virtualize
    let price = protect!(virtualization "price-calculation" => {
        compute_price(299, 15)
    });
    println!("final price: {}", price);

    // 3. Guard form, for regions with early returns
    let _region = ProtectedRegion::enter(RegionKind::Mutation, "greeting");
    let greeting = vmprotect::decrypt!("Hello from a protected region")?;
    println!("{}", greeting.to_string_lossy());
    greeting.release();

    // 4. Raw markers, paired by hand
    markers::begin_ultra("manual-region");
    do_important_work();
    markers::end();

    Ok(())
}

fn compute_price(base: u32, discount_percent: u32) -> u32 {
    base - base * discount_percent / 100
}

fn do_important_work() {
    println!("doing sensitive work...");
}
