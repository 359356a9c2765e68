fn main() {
    tarn_cli::run();
}
