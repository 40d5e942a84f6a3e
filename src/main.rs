fn main() -> Result<(), Box<dyn std::error::Error>> {
    rondo::runtime::run()
}
