fn main() {
    orifice_clean::start();
}
