fn main() {
    println!("cargo:rerun-if-env-changed=PB_CITY");
    println!("cargo:rerun-if-env-changed=PB_AREA");
    println!("cargo:rerun-if-env-changed=PB_ZONE");
    println!("cargo:rerun-if-env-changed=PB_THING_NAME");
    println!("cargo:rerun-if-env-changed=PB_BROKER_URL");
    println!("cargo:rerun-if-env-changed=PB_WIFI_SSID");
    println!("cargo:rerun-if-env-changed=PB_WIFI_PASS");

    // Only the device build needs the ESP-IDF environment exported.
    #[cfg(feature = "espidf")]
    embuild::espidf::sysenv::output();
}
