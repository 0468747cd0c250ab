fn main() {
    // write the build-time information to the file
    built::write_built_file().expect("Failed to acquire build-time information");
}
