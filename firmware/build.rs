fn main() {
    // Only the device binary links against ESP-IDF
    #[cfg(feature = "esp32")]
    embuild::espidf::sysenv::output();
}
