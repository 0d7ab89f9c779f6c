fn main() {
    // Exposed to the crate as BUILD_DATE
    let stamp = chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC");
    println!("cargo:rustc-env=BUILD_DATE={}", stamp);
}
