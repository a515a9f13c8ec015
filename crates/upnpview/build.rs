fn main() {
    // Surfaced by `upnpview version --extended`.
    for (from, to) in [
        ("TARGET", "UPNPVIEW_BUILD_TARGET"),
        ("PROFILE", "UPNPVIEW_BUILD_PROFILE"),
    ] {
        if let Ok(value) = std::env::var(from) {
            println!("cargo:rustc-env={to}={value}");
        }
        println!("cargo:rerun-if-env-changed={from}");
    }
}
